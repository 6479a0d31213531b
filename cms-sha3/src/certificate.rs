//! X.509 helpers shared by chain building, trust evaluation and verification.

use chrono::{DateTime, Utc};
use cms_sha3_common::crypto::digest::DigestAlgorithm;
use cms_sha3_common::crypto::verify::VerifyingKey;
use cms_sha3_common::{AlgorithmDescriptor, CmsError, Result};
use cms_sha3_der::ResolverChain;
use const_oid::AssociatedOid;
use der::{Decode, Encode};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::ext::pkix::SubjectKeyIdentifier;
use x509_cert::Certificate;

/// Digest used together with a signature algorithm.
///
/// Ed25519 hashes internally, the returned digest is not used for it.
pub fn signature_digest(descriptor: &AlgorithmDescriptor) -> Result<DigestAlgorithm> {
    match (descriptor.hash(), descriptor.name()) {
        (Some(hash), _) => DigestAlgorithm::try_from(hash),
        (None, "Ed25519") => Ok(DigestAlgorithm::Sha512),
        _ => Err(CmsError::UnsupportedAlgorithm(descriptor.to_string())),
    }
}

/// Verify that `certificate` was signed by the owner of `issuer`.
pub fn verify_certificate_signature(
    resolver: &ResolverChain,
    certificate: &Certificate,
    issuer: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    let descriptor = resolver.decode_algorithm(&certificate.signature_algorithm)?;
    let digest = signature_digest(&descriptor)?;
    // The TBS part is what the issuer signed.
    let tbs = certificate.tbs_certificate.to_der()?;
    let signature = certificate
        .signature
        .as_bytes()
        .ok_or(CmsError::DecodingSignatureFailed)?;
    VerifyingKey::from_spki(issuer)?.verify(digest, &tbs, signature)
}

pub fn is_self_issued(certificate: &Certificate) -> bool {
    certificate.tbs_certificate.issuer == certificate.tbs_certificate.subject
}

pub fn subject_key_identifier(certificate: &Certificate) -> Option<Vec<u8>> {
    certificate
        .tbs_certificate
        .extensions
        .as_ref()?
        .iter()
        .find(|ext| ext.extn_id == SubjectKeyIdentifier::OID)
        .and_then(|ext| SubjectKeyIdentifier::from_der(ext.extn_value.as_bytes()).ok())
        .map(|ski| ski.0.as_bytes().to_vec())
}

pub fn is_valid_at(certificate: &Certificate, time: &DateTime<Utc>) -> bool {
    let validity = &certificate.tbs_certificate.validity;
    let Ok(now) = u64::try_from(time.timestamp()) else {
        return false;
    };
    validity.not_before.to_unix_duration().as_secs() <= now
        && now <= validity.not_after.to_unix_duration().as_secs()
}

/// Builds the chain from `leaf` towards its root, using `candidates` as intermediates.
///
/// The walk stops at a self-issued certificate or when no issuer can be found.
pub fn build_chain(
    resolver: &ResolverChain,
    leaf: &Certificate,
    candidates: &[Certificate],
) -> Vec<Certificate> {
    let mut chain = vec![leaf.clone()];
    while chain.len() <= candidates.len() {
        let Some(current) = chain.last() else {
            break;
        };
        if is_self_issued(current) {
            break;
        }
        let issuer = candidates.iter().find(|candidate| {
            candidate.tbs_certificate.subject == current.tbs_certificate.issuer
                && !chain.contains(candidate)
                && verify_certificate_signature(
                    resolver,
                    current,
                    &candidate.tbs_certificate.subject_public_key_info,
                )
                .is_ok()
        });
        match issuer {
            Some(issuer) => chain.push(issuer.clone()),
            None => break,
        }
    }
    chain
}

pub fn certificate_from_der_or_pem(data: &[u8]) -> Result<Certificate> {
    use der::DecodePem;
    if data.starts_with(b"-----BEGIN") {
        Ok(Certificate::from_pem(data)?)
    } else {
        Ok(Certificate::from_der(data)?)
    }
}
