//! Enhanced Security Services attributes, RFC 5035.

use cms_sha3_common::crypto::digest::DigestAlgorithm;
use const_oid::db::rfc5912::ID_SHA_256;
use der::asn1::OctetString;
use der::{Any, Sequence};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::pkix::name::GeneralNames;
use x509_cert::serial_number::SerialNumber;

/// `SigningCertificateV2 ::= SEQUENCE { certs SEQUENCE OF ESSCertIDv2, policies ... OPTIONAL }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SigningCertificateV2 {
    pub certs: Vec<EssCertIdV2>,
    #[asn1(optional = "true")]
    pub policies: Option<Vec<Any>>,
}

/// Hash of a certificate.
///
/// An absent `hash_algorithm` stands for the SHA-256 default, which DER omits.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct EssCertIdV2 {
    #[asn1(optional = "true")]
    pub hash_algorithm: Option<AlgorithmIdentifierOwned>,
    pub cert_hash: OctetString,
    #[asn1(optional = "true")]
    pub issuer_serial: Option<IssuerSerial>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct IssuerSerial {
    pub issuer: GeneralNames,
    pub serial_number: SerialNumber,
}

impl EssCertIdV2 {
    /// Hash algorithm with the default applied.
    pub fn hash_algorithm(&self) -> AlgorithmIdentifierOwned {
        self.hash_algorithm
            .clone()
            .unwrap_or(AlgorithmIdentifierOwned {
                oid: ID_SHA_256,
                parameters: None,
            })
    }
}

impl SigningCertificateV2 {
    /// Attribute value referencing a single certificate by its SHA-256 hash.
    pub fn sha256(cert_der: &[u8]) -> der::Result<Self> {
        Self::new(cert_der, DigestAlgorithm::Sha256, None)
    }

    /// Attribute value referencing a single certificate hashed with `digest`.
    ///
    /// `hash_algorithm` is the encoded identifier of `digest`. Pass `None` for SHA-256.
    pub fn new(
        cert_der: &[u8],
        digest: DigestAlgorithm,
        hash_algorithm: Option<AlgorithmIdentifierOwned>,
    ) -> der::Result<Self> {
        Ok(Self {
            certs: vec![EssCertIdV2 {
                hash_algorithm,
                cert_hash: OctetString::new(digest.digest(cert_der))?,
                issuer_serial: None,
            }],
            policies: None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::SigningCertificateV2;
    use cms_sha3_common::crypto::digest::DigestAlgorithm;
    use const_oid::db::rfc5912::{ID_SHA_256, ID_SHA_512};
    use der::{Decode, Encode};
    use spki::AlgorithmIdentifierOwned;

    #[test]
    fn test_default_hash_is_omitted() {
        let value = SigningCertificateV2::sha256(b"certificate").unwrap();
        let der = value.to_der().unwrap();
        // SEQUENCE { SEQUENCE { SEQUENCE { OCTET STRING (32) } } }
        assert_eq!(der.len(), 2 + 2 + 2 + 2 + 32);
        assert_eq!(&der[6..8], &[0x04, 0x20]);
        let decoded = SigningCertificateV2::from_der(&der).unwrap();
        assert!(decoded.certs[0].hash_algorithm.is_none());
        assert_eq!(decoded.certs[0].hash_algorithm().oid, ID_SHA_256);
        assert_eq!(
            decoded.certs[0].cert_hash.as_bytes(),
            DigestAlgorithm::Sha256.digest(b"certificate").as_slice()
        );
    }

    #[test]
    fn test_explicit_hash() {
        let sha512 = AlgorithmIdentifierOwned {
            oid: ID_SHA_512,
            parameters: None,
        };
        let value =
            SigningCertificateV2::new(b"certificate", DigestAlgorithm::Sha512, Some(sha512))
                .unwrap();
        let decoded = SigningCertificateV2::from_der(&value.to_der().unwrap()).unwrap();
        assert_eq!(decoded.certs[0].hash_algorithm().oid, ID_SHA_512);
        assert_eq!(decoded.certs[0].cert_hash.as_bytes().len(), 64);
    }
}
