use chrono::{DateTime, Utc};
use cms_sha3_common::AlgorithmDescriptor;
use core::fmt;

/// Stable identifiers of the verification steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateCode {
    Formatting,
    Algorithm,
    Chain,
    CertificateValidity,
    Trust,
    SigningCertificate,
    Digest,
    Signature,
}

impl StateCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateCode::Formatting => "formatting",
            StateCode::Algorithm => "algorithm",
            StateCode::Chain => "chain",
            StateCode::CertificateValidity => "certificate_validity",
            StateCode::Trust => "trust",
            StateCode::SigningCertificate => "signing_certificate",
            StateCode::Digest => "digest",
            StateCode::Signature => "signature",
        }
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Valid,
    Invalid,
    Info,
}

/// Outcome of one verification step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationState {
    pub code: StateCode,
    pub kind: StateKind,
    pub text: String,
    pub result_message: Option<String>,
}

impl VerificationState {
    pub fn valid(code: StateCode, text: impl Into<String>) -> Self {
        Self::new(code, StateKind::Valid, text)
    }

    pub fn invalid(code: StateCode, text: impl Into<String>) -> Self {
        Self::new(code, StateKind::Invalid, text)
    }

    pub fn info(code: StateCode, text: impl Into<String>) -> Self {
        Self::new(code, StateKind::Info, text)
    }

    fn new(code: StateCode, kind: StateKind, text: impl Into<String>) -> Self {
        Self {
            code,
            kind,
            text: text.into(),
            result_message: None,
        }
    }

    pub fn with_message(mut self, message: impl fmt::Display) -> Self {
        self.result_message = Some(message.to_string());
        self
    }

    pub fn is_valid(&self) -> bool {
        self.kind == StateKind::Valid
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}.", self.code, self.text)?;
        if let Some(message) = &self.result_message {
            write!(f, " {message}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerCertificateInfo {
    pub subject: String,
    pub issuer: String,
    /// Hex encoded serial number.
    pub serial_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDataInfo {
    pub digest_algorithm: AlgorithmDescriptor,
    pub signature_algorithm: AlgorithmDescriptor,
    pub named_curve: Option<String>,
}

/// Result of verifying one embedded signature.
///
/// States are appended in the order the steps run and cannot be changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureReport {
    pub check_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub reason: Option<String>,
    pub signature_type: String,
    pub signer_certificate: Option<SignerCertificateInfo>,
    pub signed_data: Option<SignedDataInfo>,
    states: Vec<VerificationState>,
}

impl SignatureReport {
    pub(crate) fn new(signature_type: impl Into<String>) -> Self {
        Self {
            check_date: None,
            location: None,
            reason: None,
            signature_type: signature_type.into(),
            signer_certificate: None,
            signed_data: None,
            states: vec![],
        }
    }

    pub fn states(&self) -> &[VerificationState] {
        &self.states
    }

    pub fn state(&self, code: StateCode) -> Option<&VerificationState> {
        self.states.iter().find(|state| state.code == code)
    }

    pub(crate) fn push(&mut self, state: VerificationState) {
        self.states.push(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
}

/// Verification result of a whole artifact, one item per embedded signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Set when the artifact could not be read at all.
    pub error: Option<ErrorInfo>,
    pub items: Vec<SignatureReport>,
}

impl VerificationReport {
    pub fn from_error(message: impl fmt::Display) -> Self {
        Self {
            error: Some(ErrorInfo {
                message: message.to_string(),
            }),
            items: vec![],
        }
    }
}
