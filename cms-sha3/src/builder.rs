use crate::certificate::subject_key_identifier;
use chrono::{DateTime, Duration, TimeZone, Utc};
use cms_sha3_common::crypto::digest::DigestAlgorithm;
use cms_sha3_common::crypto::sign::{Cipher, SigningKey};
use cms_sha3_common::{CmsError, Result};
use cms_sha3_der::ResolverChain;
use const_oid::AssociatedOid;
use core::str::FromStr;
use der::asn1::{BitString, OctetString, UtcTime};
use der::Encode;
use spki::SubjectPublicKeyInfoOwned;
use tracing::debug;
use x509_cert::certificate::{TbsCertificate, Version};
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, KeyUsages, SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;

pub const ROOT_SUBJECT: &str = "CN=Test Root CA,O=Peculiar Ventures";
pub const LEAF_SUBJECT: &str = "CN=Test certificate,O=Peculiar Ventures";
const ROOT_SERIAL: [u8; 6] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
const LEAF_SERIAL_LEN: usize = 10;

/// A certificate together with the private key of its subject.
#[derive(Debug, Clone)]
pub struct SigningCertificate {
    pub certificate: Certificate,
    pub key: SigningKey,
}

/// Leaf certificate issued by a self-signed root.
#[derive(Debug, Clone)]
pub struct CertificateChain {
    pub leaf: SigningCertificate,
    pub root: SigningCertificate,
}

impl CertificateChain {
    /// Certificates in the order they are embedded into a signature, leaf first.
    pub fn certificates(&self) -> Vec<Certificate> {
        vec![self.leaf.certificate.clone(), self.root.certificate.clone()]
    }
}

/// Builder for X.509 v3 certificates.
pub struct CertificateBuilder {
    subject: String,
    serial: Vec<u8>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    ca: bool,
    key_usage: KeyUsage,
    digest: DigestAlgorithm,
}

impl CertificateBuilder {
    /// Starts a certificate for `subject` given as an RFC 4514 string, e.g. `CN=Test,O=Org`.
    pub fn new(subject: impl Into<String>) -> Self {
        let now = Utc::now();
        CertificateBuilder {
            subject: subject.into(),
            serial: vec![0x01],
            not_before: now,
            not_after: now + Duration::days(1),
            ca: false,
            key_usage: KeyUsage(KeyUsages::DigitalSignature.into()),
            digest: DigestAlgorithm::Sha256,
        }
    }

    pub fn with_serial(mut self, serial: &[u8]) -> Self {
        self.serial = serial.to_vec();
        self
    }

    /// Random positive serial number of `len` bytes.
    pub fn with_random_serial(mut self, len: usize) -> Self {
        use rand_core::RngCore;
        let mut serial = vec![0u8; len.max(1)];
        rand_core::OsRng.fill_bytes(&mut serial);
        // positive and without a redundant leading zero
        serial[0] = (serial[0] & 0x7f) | 0x01;
        self.serial = serial;
        self
    }

    pub fn with_validity(mut self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    pub fn with_ca(mut self, ca: bool) -> Self {
        self.ca = ca;
        self
    }

    pub fn with_key_usage(mut self, key_usage: KeyUsage) -> Self {
        self.key_usage = key_usage;
        self
    }

    /// Digest the issuer signs the certificate with.
    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    /// Signs the certificate with the subject's own key.
    pub fn self_signed(self, resolver: &ResolverChain, key: &SigningKey) -> Result<Certificate> {
        let spki = key.as_spki()?;
        let skid = key_identifier(&spki);
        let subject = parse_name(&self.subject)?;
        self.sign(resolver, spki, subject, key, skid)
    }

    /// Signs the certificate for `subject_key` with the key of `issuer`.
    pub fn issued_by(
        self,
        resolver: &ResolverChain,
        subject_key: &SigningKey,
        issuer: &SigningCertificate,
    ) -> Result<Certificate> {
        let spki = subject_key.as_spki()?;
        let authority_key_id = subject_key_identifier(&issuer.certificate).unwrap_or_else(|| {
            key_identifier(&issuer.certificate.tbs_certificate.subject_public_key_info)
        });
        let issuer_name = issuer.certificate.tbs_certificate.subject.clone();
        self.sign(resolver, spki, issuer_name, &issuer.key, authority_key_id)
    }

    fn sign(
        self,
        resolver: &ResolverChain,
        spki: SubjectPublicKeyInfoOwned,
        issuer: Name,
        issuer_key: &SigningKey,
        authority_key_id: Vec<u8>,
    ) -> Result<Certificate> {
        let signature_algorithm =
            resolver.encode_algorithm(&issuer_key.signature_algorithm(self.digest))?;

        let mut extensions = vec![
            extension(&self.key_usage, true)?,
            extension(
                &SubjectKeyIdentifier(OctetString::new(key_identifier(&spki))?),
                false,
            )?,
            extension(
                &AuthorityKeyIdentifier {
                    key_identifier: Some(OctetString::new(authority_key_id)?),
                    authority_cert_issuer: None,
                    authority_cert_serial_number: None,
                },
                false,
            )?,
        ];
        if self.ca {
            extensions.push(extension(
                &BasicConstraints {
                    ca: true,
                    path_len_constraint: None,
                },
                true,
            )?);
        }

        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&self.serial)?,
            signature: signature_algorithm.clone(),
            issuer,
            validity: Validity {
                not_before: utc_time(&self.not_before)?,
                not_after: utc_time(&self.not_after)?,
            },
            subject: parse_name(&self.subject)?,
            subject_public_key_info: spki,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        };
        let signature = issuer_key.sign(self.digest, &tbs_certificate.to_der()?)?;
        debug!("issued certificate for {}", self.subject);
        Ok(Certificate {
            tbs_certificate,
            signature_algorithm,
            signature: BitString::from_bytes(&signature)?,
        })
    }
}

fn parse_name(name: &str) -> Result<Name> {
    Name::from_str(name).map_err(|e| CmsError::InvalidCertificate(format!("{name}: {e}")))
}

fn extension<T: AssociatedOid + Encode>(value: &T, critical: bool) -> Result<Extension> {
    Ok(Extension {
        extn_id: T::OID,
        critical,
        extn_value: OctetString::new(value.to_der()?)?,
    })
}

/// Key identifier derived from the public key bits, truncated SHA-256.
fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    let mut id = DigestAlgorithm::Sha256.digest(spki.subject_public_key.raw_bytes());
    id.truncate(20);
    id
}

fn utc_time(time: &DateTime<Utc>) -> Result<Time> {
    let secs = u64::try_from(time.timestamp())
        .map_err(|_| CmsError::InvalidCertificate(format!("time before 1970: {time}")))?;
    Ok(Time::UtcTime(UtcTime::from_unix_duration(
        core::time::Duration::from_secs(secs),
    )?))
}

fn date(year: i32, month: u32, day: u32) -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .ok_or_else(|| CmsError::InternalError(format!("invalid date {year}-{month}-{day}")))
}

/// Self-signed CA certificate, valid from 2022 until 2030.
pub fn root_certificate(resolver: &ResolverChain, cipher: Cipher) -> Result<SigningCertificate> {
    let key = SigningKey::new(cipher)?;
    let certificate = CertificateBuilder::new(ROOT_SUBJECT)
        .with_serial(&ROOT_SERIAL)
        .with_validity(date(2022, 1, 1)?, date(2030, 1, 1)?)
        .with_ca(true)
        .with_key_usage(KeyUsage(
            KeyUsages::DigitalSignature | KeyUsages::CRLSign | KeyUsages::KeyCertSign,
        ))
        .self_signed(resolver, &key)?;
    Ok(SigningCertificate { certificate, key })
}

/// End entity certificate valid for one day, issued by `root`.
pub fn leaf_certificate(
    resolver: &ResolverChain,
    cipher: Cipher,
    root: &SigningCertificate,
) -> Result<SigningCertificate> {
    let key = SigningKey::new(cipher)?;
    let now = Utc::now();
    let certificate = CertificateBuilder::new(LEAF_SUBJECT)
        .with_random_serial(LEAF_SERIAL_LEN)
        .with_validity(now, now + Duration::days(1))
        .with_key_usage(KeyUsage(
            KeyUsages::DigitalSignature | KeyUsages::NonRepudiation,
        ))
        .issued_by(resolver, &key, root)?;
    Ok(SigningCertificate { certificate, key })
}

/// Generates a root CA and a leaf certificate issued by it.
pub fn generate_chain(
    resolver: &ResolverChain,
    leaf: Cipher,
    root: Cipher,
) -> Result<CertificateChain> {
    let root = root_certificate(resolver, root)?;
    let leaf = leaf_certificate(resolver, leaf, &root)?;
    Ok(CertificateChain { leaf, root })
}

#[cfg(test)]
mod test {
    use super::{generate_chain, CertificateBuilder, LEAF_SUBJECT, ROOT_SUBJECT};
    use crate::certificate::{
        is_self_issued, subject_key_identifier, verify_certificate_signature,
    };
    use cms_sha3_common::crypto::digest::DigestAlgorithm;
    use cms_sha3_common::crypto::sign::{Cipher, SigningKey};
    use cms_sha3_der::{AlgorithmCodecRegistry, ResolverChain};
    use der::{Decode, Encode};
    use std::str::FromStr;
    use std::sync::Arc;
    use x509_cert::name::Name;
    use x509_cert::Certificate;

    fn resolver() -> ResolverChain {
        ResolverChain::new(Arc::new(AlgorithmCodecRegistry::sha3()))
    }

    #[test]
    fn test_generate_chain() {
        let resolver = resolver();
        let chain = generate_chain(&resolver, Cipher::EcdsaP256, Cipher::EcdsaP384).unwrap();
        let root = &chain.root.certificate;
        let leaf = &chain.leaf.certificate;
        assert!(is_self_issued(root));
        assert!(!is_self_issued(leaf));
        assert_eq!(root.tbs_certificate.subject, Name::from_str(ROOT_SUBJECT).unwrap());
        assert_eq!(leaf.tbs_certificate.subject, Name::from_str(LEAF_SUBJECT).unwrap());
        assert_eq!(leaf.tbs_certificate.issuer, root.tbs_certificate.subject);
        verify_certificate_signature(&resolver, root, &root.tbs_certificate.subject_public_key_info)
            .unwrap();
        verify_certificate_signature(&resolver, leaf, &root.tbs_certificate.subject_public_key_info)
            .unwrap();
        assert!(verify_certificate_signature(
            &resolver,
            leaf,
            &leaf.tbs_certificate.subject_public_key_info
        )
        .is_err());
        assert!(subject_key_identifier(leaf).is_some());
    }

    #[test]
    fn test_der_round_trip() {
        let resolver = resolver();
        let chain = generate_chain(&resolver, Cipher::Ed25519, Cipher::EcdsaP256).unwrap();
        let der = chain.leaf.certificate.to_der().unwrap();
        assert_eq!(Certificate::from_der(&der).unwrap(), chain.leaf.certificate);
        assert_eq!(chain.certificates().len(), 2);
    }

    #[test]
    fn test_sha3_signed_certificate() {
        let resolver = resolver();
        let key = SigningKey::new(Cipher::EcdsaP256).unwrap();
        let certificate = CertificateBuilder::new("CN=SHA3")
            .with_digest(DigestAlgorithm::Sha3_256)
            .self_signed(&resolver, &key)
            .unwrap();
        assert_eq!(
            certificate.signature_algorithm.oid.to_string(),
            "2.16.840.1.101.3.4.3.10"
        );
        verify_certificate_signature(
            &resolver,
            &certificate,
            &certificate.tbs_certificate.subject_public_key_info,
        )
        .unwrap();
    }
}
