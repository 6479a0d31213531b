//! Verification of every signature embedded in an artifact.
//!
//! Each signature runs through the same ordered steps and produces one state per step.
//! Content problems never abort the verification of the artifact. A step that cannot be
//! completed ends the report of its signature, the remaining signatures are still checked.

use crate::artifact::dictionary::SignatureDictionary;
use crate::artifact::{locate_signatures, parse_signing_time, ByteRange};
use crate::certificate::{build_chain, is_self_issued, is_valid_at, subject_key_identifier};
use crate::report::{
    SignatureReport, SignedDataInfo, SignerCertificateInfo, StateCode, VerificationReport,
    VerificationState,
};
use crate::trust::{NullTrustEvaluator, TrustEvaluator};
use chrono::Utc;
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use cms_sha3_common::constants::{
    ID_AA_SIGNING_CERTIFICATE_V2, ID_MESSAGE_DIGEST, ID_SIGNED_DATA,
};
use cms_sha3_common::crypto::digest::DigestAlgorithm;
use cms_sha3_common::crypto::verify::VerifyingKey;
use cms_sha3_common::{AlgorithmDescriptor, CmsError, Result};
use cms_sha3_der::ess::SigningCertificateV2;
use cms_sha3_der::{AlgorithmCodecRegistry, ResolverChain};
use const_oid::ObjectIdentifier;
use der::asn1::OctetString;
use der::{Any, Decode, Encode, SliceReader};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use x509_cert::Certificate;

/// Container decoded from a signature dictionary.
struct ParsedSignature {
    signed_data: SignedData,
    signer_info: SignerInfo,
    /// Bytes covered by the `/ByteRange`.
    content: Vec<u8>,
}

struct Algorithms {
    digest: DigestAlgorithm,
    signature: AlgorithmDescriptor,
    /// Hash of the signature scheme, `digest` for schemes without one.
    signature_digest: DigestAlgorithm,
}

/// Verifies CMS signatures, resolving algorithm identifiers through the codec registry.
pub struct SignatureVerificationEngine {
    resolver: ResolverChain,
    trust: Box<dyn TrustEvaluator>,
}

impl SignatureVerificationEngine {
    /// Creates an engine that trusts no certificate.
    pub fn new(registry: Arc<AlgorithmCodecRegistry>) -> Self {
        Self {
            resolver: ResolverChain::new(registry),
            trust: Box::new(NullTrustEvaluator),
        }
    }

    pub fn with_trust_evaluator(mut self, evaluator: impl TrustEvaluator + 'static) -> Self {
        self.trust = Box::new(evaluator);
        self
    }

    pub fn resolver(&self) -> &ResolverChain {
        &self.resolver
    }

    /// Reads and verifies the artifact at `path`. A read failure is reported in
    /// [`VerificationReport::error`].
    pub async fn verify_file(&self, path: impl AsRef<Path>) -> VerificationReport {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(data) => self.verify(&data).await,
            Err(e) => {
                warn!("failed to read {}: {e}", path.display());
                VerificationReport::from_error(format!("Cannot read {}: {e}", path.display()))
            }
        }
    }

    pub async fn verify(&self, data: &[u8]) -> VerificationReport {
        let dictionaries = locate_signatures(data);
        info!("found {} signature(s)", dictionaries.len());
        let mut report = VerificationReport::default();
        for dictionary in dictionaries {
            report.items.push(self.verify_signature(data, dictionary).await);
        }
        report
    }

    async fn verify_signature(
        &self,
        data: &[u8],
        dictionary: Result<SignatureDictionary>,
    ) -> SignatureReport {
        let mut report = SignatureReport::new("unknown");
        let dictionary = match dictionary {
            Ok(dictionary) => dictionary,
            Err(e) => {
                report.check_date = Some(Utc::now());
                push(
                    &mut report,
                    VerificationState::invalid(StateCode::Formatting, "Malformed signature dictionary")
                        .with_message(e),
                );
                return report;
            }
        };
        report.check_date = Some(
            dictionary
                .signing_time
                .as_deref()
                .and_then(parse_signing_time)
                .unwrap_or_else(Utc::now),
        );
        report.reason = dictionary.reason.clone();
        report.location = dictionary.location.clone();
        if let Some(sub_filter) = &dictionary.sub_filter {
            report.signature_type = sub_filter.clone();
        }
        debug!("verifying signature at offset {}", dictionary.offset);
        if let Err(state) = self.run_steps(data, &dictionary, &mut report).await {
            info!("verification stopped: {state}");
            push(&mut report, state);
        }
        report
    }

    /// Runs the steps in order. An `Err` is the state of the step that ended the verification.
    async fn run_steps(
        &self,
        data: &[u8],
        dictionary: &SignatureDictionary,
        report: &mut SignatureReport,
    ) -> core::result::Result<(), VerificationState> {
        let parsed = parse_container(data, dictionary)?;
        push(
            report,
            VerificationState::valid(StateCode::Formatting, "Signature container is well-formed"),
        );

        let (algorithms, signed_data) = self.resolve_algorithms(&parsed.signer_info)?;
        report.signed_data = Some(signed_data);

        let certificates = parsed
            .signed_data
            .certificates
            .as_ref()
            .map(|set| {
                set.0
                    .iter()
                    .filter_map(|choice| match choice {
                        CertificateChoices::Certificate(certificate) => Some(certificate.clone()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let signer = find_signer(&parsed.signer_info.sid, &certificates)?;
        report.signer_certificate = Some(signer_certificate_info(&signer));
        let key = VerifyingKey::from_spki(&signer.tbs_certificate.subject_public_key_info)
            .map_err(|e| {
                VerificationState::invalid(StateCode::Algorithm, "Unsupported signer key")
                    .with_message(e)
            })?;
        if let Some(signed_data) = report.signed_data.as_mut() {
            signed_data.named_curve = key.named_curve().map(str::to_string);
        }
        let signature_algorithm = &algorithms.signature;
        if !key.supports(signature_algorithm.name()) {
            return Err(VerificationState::invalid(
                StateCode::Algorithm,
                "Signature algorithm does not match the signer key",
            )
            .with_message(format!(
                "{signature_algorithm} cannot be checked with the signer key"
            )));
        }
        push(
            report,
            VerificationState::valid(StateCode::Algorithm, "Algorithms are supported").with_message(
                format!("digest {}, signature {signature_algorithm}", algorithms.digest.name()),
            ),
        );

        let chain = build_chain(&self.resolver, &signer, &certificates);
        let chain_state = match chain.last() {
            Some(last) if is_self_issued(last) => {
                VerificationState::valid(StateCode::Chain, "Certificate chain is complete")
            }
            _ => VerificationState::info(StateCode::Chain, "Certificate chain is incomplete"),
        };
        push(report, chain_state.with_message(format!("{} certificate(s)", chain.len())));

        let check_date = report.check_date.unwrap_or_else(Utc::now);
        let validity = if is_valid_at(&signer, &check_date) {
            VerificationState::valid(
                StateCode::CertificateValidity,
                "Signer certificate is valid at the check date",
            )
        } else {
            VerificationState::invalid(
                StateCode::CertificateValidity,
                "Signer certificate is not valid at the check date",
            )
            .with_message(check_date.to_rfc3339())
        };
        push(report, validity);

        let trust = self.evaluate_trust(&chain).await;
        push(report, trust);

        push(
            report,
            check_signing_certificate(&self.resolver, &parsed.signer_info, &signer),
        );
        push(report, check_digest(&parsed, algorithms.digest));
        push(
            report,
            check_signature(&parsed, &key, algorithms.signature_digest),
        );
        Ok(())
    }

    fn resolve_algorithms(
        &self,
        signer_info: &SignerInfo,
    ) -> core::result::Result<(Algorithms, SignedDataInfo), VerificationState> {
        let invalid = |e: CmsError| {
            VerificationState::invalid(StateCode::Algorithm, "Unsupported algorithm").with_message(e)
        };
        let digest_descriptor = self
            .resolver
            .decode_algorithm(&signer_info.digest_alg)
            .map_err(invalid)?;
        let signature_descriptor = self
            .resolver
            .decode_algorithm(&signer_info.signature_algorithm)
            .map_err(invalid)?;

        let digest = DigestAlgorithm::try_from(&digest_descriptor).map_err(invalid)?;
        let signature_digest = match signature_descriptor.hash() {
            Some(hash) => DigestAlgorithm::try_from(hash).map_err(invalid)?,
            None => digest,
        };
        let info = SignedDataInfo {
            digest_algorithm: digest_descriptor,
            signature_algorithm: signature_descriptor.clone(),
            named_curve: None,
        };
        Ok((
            Algorithms {
                digest,
                signature: signature_descriptor,
                signature_digest,
            },
            info,
        ))
    }

    /// Walks the chain from the signer upwards, the first trusted certificate wins.
    async fn evaluate_trust(&self, chain: &[Certificate]) -> VerificationState {
        let mut reason = None;
        for certificate in chain {
            match self.trust.is_trusted(certificate).await {
                Ok(result) if result.trusted => {
                    debug!("trusted by {}", result.evaluator);
                    return VerificationState::valid(StateCode::Trust, "Certificate is trusted")
                        .with_message(format!(
                            "{} trusted by {}",
                            certificate.tbs_certificate.subject, result.evaluator
                        ));
                }
                Ok(result) => reason = result.message.or(reason),
                Err(e) => {
                    warn!("trust evaluation failed: {e}");
                    reason = Some(e.to_string());
                }
            }
        }
        let state = VerificationState::invalid(StateCode::Trust, "Certificate is not trusted");
        match reason {
            Some(reason) => state.with_message(reason),
            None => state,
        }
    }
}

fn push(report: &mut SignatureReport, state: VerificationState) {
    debug!("{state}");
    report.push(state);
}

fn malformed(e: impl core::fmt::Display) -> VerificationState {
    VerificationState::invalid(StateCode::Formatting, "Malformed signature container").with_message(e)
}

fn parse_container(
    data: &[u8],
    dictionary: &SignatureDictionary,
) -> core::result::Result<ParsedSignature, VerificationState> {
    let contents = dictionary
        .contents
        .as_ref()
        .ok_or_else(|| malformed("missing /Contents"))?;
    let byte_range = dictionary
        .byte_range
        .as_deref()
        .ok_or_else(|| malformed("missing /ByteRange"))
        .and_then(|values| ByteRange::from_slice(values).map_err(malformed))?;
    if byte_range.gap() != contents.span {
        return Err(malformed("/ByteRange does not exclude exactly /Contents"));
    }
    let content = byte_range.extract(data).map_err(malformed)?;

    // The container is followed by the zero padding of the placeholder.
    let mut reader = SliceReader::new(&contents.bytes).map_err(malformed)?;
    let content_info = ContentInfo::decode(&mut reader).map_err(malformed)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(malformed(format!(
            "content type {} is not signed data",
            content_info.content_type
        )));
    }
    let signed_data = content_info
        .content
        .decode_as::<SignedData>()
        .map_err(malformed)?;
    let signer_info = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .cloned()
        .ok_or_else(|| malformed("no signer info"))?;
    Ok(ParsedSignature {
        signed_data,
        signer_info,
        content,
    })
}

fn find_signer(
    sid: &SignerIdentifier,
    certificates: &[Certificate],
) -> core::result::Result<Certificate, VerificationState> {
    let signer = certificates.iter().find(|certificate| match sid {
        SignerIdentifier::IssuerAndSerialNumber(id) => {
            certificate.tbs_certificate.issuer == id.issuer
                && certificate.tbs_certificate.serial_number == id.serial_number
        }
        SignerIdentifier::SubjectKeyIdentifier(ski) => {
            subject_key_identifier(certificate).as_deref() == Some(ski.0.as_bytes())
        }
    });
    signer.cloned().ok_or_else(|| {
        VerificationState::invalid(StateCode::Chain, "Signer certificate not found")
            .with_message(format!("{} embedded certificate(s)", certificates.len()))
    })
}

fn signer_certificate_info(certificate: &Certificate) -> SignerCertificateInfo {
    let tbs = &certificate.tbs_certificate;
    SignerCertificateInfo {
        subject: tbs.subject.to_string(),
        issuer: tbs.issuer.to_string(),
        serial_number: hex::encode(tbs.serial_number.as_bytes()),
    }
}

fn signed_attribute(signer_info: &SignerInfo, oid: ObjectIdentifier) -> Option<&Any> {
    signer_info
        .signed_attrs
        .as_ref()?
        .iter()
        .find(|attribute| attribute.oid == oid)
        .and_then(|attribute| attribute.values.iter().next())
}

/// Compares every `ESSCertIDv2` hash with the signer, each hashed with its own algorithm.
fn check_signing_certificate(
    resolver: &ResolverChain,
    signer_info: &SignerInfo,
    signer: &Certificate,
) -> VerificationState {
    const CODE: StateCode = StateCode::SigningCertificate;
    let Some(value) = signed_attribute(signer_info, ID_AA_SIGNING_CERTIFICATE_V2) else {
        return VerificationState::info(CODE, "No signing certificate attribute");
    };
    let (attribute, signer_der) = match value
        .decode_as::<SigningCertificateV2>()
        .map_err(CmsError::from)
        .and_then(|attribute| Ok((attribute, signer.to_der()?)))
    {
        Ok(decoded) => decoded,
        Err(e) => {
            return VerificationState::invalid(CODE, "Malformed signing certificate attribute")
                .with_message(e)
        }
    };
    for id in &attribute.certs {
        let hash_algorithm = id.hash_algorithm();
        let digest = match resolver
            .decode_algorithm(&hash_algorithm)
            .and_then(|descriptor| DigestAlgorithm::try_from(&descriptor))
        {
            Ok(digest) => digest,
            Err(e) => {
                return VerificationState::invalid(CODE, "Unsupported signing certificate hash")
                    .with_message(e)
            }
        };
        if id.cert_hash.as_bytes() == digest.digest(&signer_der).as_slice() {
            return VerificationState::valid(CODE, "Signing certificate matches the signer")
                .with_message(digest.name());
        }
    }
    VerificationState::invalid(CODE, "Signing certificate does not match the signer")
}

fn check_digest(parsed: &ParsedSignature, digest: DigestAlgorithm) -> VerificationState {
    const CODE: StateCode = StateCode::Digest;
    if parsed.signer_info.signed_attrs.is_none() {
        return VerificationState::info(
            CODE,
            "No signed attributes, the signature covers the content directly",
        );
    }
    let Some(value) = signed_attribute(&parsed.signer_info, ID_MESSAGE_DIGEST) else {
        return VerificationState::invalid(CODE, "Missing message digest attribute");
    };
    let expected = match value.decode_as::<OctetString>() {
        Ok(expected) => expected,
        Err(e) => {
            return VerificationState::invalid(CODE, "Malformed message digest attribute")
                .with_message(e)
        }
    };
    let actual = digest.digest(&parsed.content);
    if expected.as_bytes() == actual.as_slice() {
        VerificationState::valid(CODE, "Content digest matches")
    } else {
        VerificationState::invalid(CODE, "Content digest does not match").with_message(format!(
            "expected {}, computed {}",
            hex::encode(expected.as_bytes()),
            hex::encode(&actual)
        ))
    }
}

fn check_signature(
    parsed: &ParsedSignature,
    key: &VerifyingKey,
    digest: DigestAlgorithm,
) -> VerificationState {
    const CODE: StateCode = StateCode::Signature;
    let verify = || -> Result<()> {
        let signed = match &parsed.signer_info.signed_attrs {
            Some(signed_attrs) => signed_attrs.to_der()?,
            None => parsed.content.clone(),
        };
        key.verify(digest, &signed, parsed.signer_info.signature.as_bytes())
    };
    match verify() {
        Ok(()) => VerificationState::valid(CODE, "Signature is valid"),
        Err(e) => VerificationState::invalid(CODE, "Signature is invalid").with_message(e),
    }
}
