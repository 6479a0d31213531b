use crate::certificate::{is_self_issued, verify_certificate_signature};
use async_trait::async_trait;
use cms_sha3_common::Result;
use cms_sha3_der::ResolverChain;
use der::Encode;
use tracing::debug;
use x509_cert::Certificate;

/// Answer of a [`TrustEvaluator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustResult {
    /// Name of the evaluator that produced the result.
    pub evaluator: &'static str,
    pub trusted: bool,
    /// Why the certificate is not trusted, if the evaluator knows.
    pub message: Option<String>,
}

impl TrustResult {
    pub fn trusted(evaluator: &'static str) -> Self {
        Self {
            evaluator,
            trusted: true,
            message: None,
        }
    }

    pub fn untrusted(evaluator: &'static str, message: Option<String>) -> Self {
        Self {
            evaluator,
            trusted: false,
            message,
        }
    }
}

/// Decides whether a certificate is a trust anchor.
///
/// An `Err` is reported as "not trusted" with the error as the reason.
#[async_trait(?Send)]
pub trait TrustEvaluator {
    async fn is_trusted(&self, certificate: &Certificate) -> Result<TrustResult>;
}

/// Trusts nothing. This is the default of the verification engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTrustEvaluator;

#[async_trait(?Send)]
impl TrustEvaluator for NullTrustEvaluator {
    async fn is_trusted(&self, _certificate: &Certificate) -> Result<TrustResult> {
        Ok(TrustResult::untrusted(
            "null",
            Some("no trust anchors are configured".to_string()),
        ))
    }
}

/// Trusts every certificate that is self-signed, i.e. its own key validates its signature.
#[derive(Debug, Clone)]
pub struct SelfSignedTrustEvaluator {
    resolver: ResolverChain,
}

impl SelfSignedTrustEvaluator {
    pub fn new(resolver: ResolverChain) -> Self {
        Self { resolver }
    }
}

#[async_trait(?Send)]
impl TrustEvaluator for SelfSignedTrustEvaluator {
    async fn is_trusted(&self, certificate: &Certificate) -> Result<TrustResult> {
        const NAME: &str = "self-signed";
        if !is_self_issued(certificate) {
            return Ok(TrustResult::untrusted(
                NAME,
                Some("issuer and subject differ".to_string()),
            ));
        }
        match verify_certificate_signature(
            &self.resolver,
            certificate,
            &certificate.tbs_certificate.subject_public_key_info,
        ) {
            Ok(()) => Ok(TrustResult::trusted(NAME)),
            Err(e) => {
                debug!("self-issued certificate failed its own signature check: {e}");
                Ok(TrustResult::untrusted(NAME, Some(e.to_string())))
            }
        }
    }
}

/// Trusts exactly the configured certificates, compared by their DER encoding.
#[derive(Debug, Clone, Default)]
pub struct TrustStoreEvaluator {
    roots: Vec<Vec<u8>>,
}

impl TrustStoreEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_trusted_root(&mut self, certificate: &Certificate) -> Result<()> {
        self.roots.push(certificate.to_der()?);
        Ok(())
    }

    pub fn with_trusted_root(mut self, certificate: &Certificate) -> Result<Self> {
        self.add_trusted_root(certificate)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[async_trait(?Send)]
impl TrustEvaluator for TrustStoreEvaluator {
    async fn is_trusted(&self, certificate: &Certificate) -> Result<TrustResult> {
        const NAME: &str = "trust-store";
        let der = certificate.to_der()?;
        if self.roots.iter().any(|root| *root == der) {
            Ok(TrustResult::trusted(NAME))
        } else {
            Ok(TrustResult::untrusted(
                NAME,
                Some("certificate is not in the trust store".to_string()),
            ))
        }
    }
}
