use crate::crypto::digest::DigestAlgorithm;
use crate::crypto::pkcs1v15_padding;
use crate::crypto::verify::VerifyingKey;
use crate::{AlgorithmDescriptor, CmsError, Result};
use core::str::FromStr;
use der::Decode;
use signature::hazmat::PrehashSigner;
use signature::Signer;
use spki::{EncodePublicKey, SubjectPublicKeyInfoOwned};
use tracing::debug;

#[derive(Debug, Clone)]
pub enum SigningKey {
    EcdsaP256(p256::ecdsa::SigningKey),
    EcdsaP384(p384::ecdsa::SigningKey),
    Ed25519Dalek(ed25519_dalek::SigningKey),
    Rsa(rsa::RsaPrivateKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cipher {
    EcdsaP256,
    EcdsaP384,
    Ed25519,
    Rsa,
}

impl Cipher {
    pub fn name(&self) -> &'static str {
        match self {
            Cipher::EcdsaP256 => "ECDSA P-256",
            Cipher::EcdsaP384 => "ECDSA P-384",
            Cipher::Ed25519 => "Ed25519",
            Cipher::Rsa => "RSA",
        }
    }
}

impl FromStr for Cipher {
    type Err = CmsError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "p-256" | "p256" | "ecdsa-p256" => Ok(Cipher::EcdsaP256),
            "p-384" | "p384" | "ecdsa-p384" => Ok(Cipher::EcdsaP384),
            "ed25519" => Ok(Cipher::Ed25519),
            "rsa" => Ok(Cipher::Rsa),
            _ => Err(CmsError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl SigningKey {
    #[cfg(feature = "rand")]
    pub fn new(cipher: Cipher) -> Result<Self> {
        debug!("generating {} key", cipher.name());
        Ok(match cipher {
            Cipher::EcdsaP256 => Self::EcdsaP256(p256::ecdsa::SigningKey::random(&mut rand_core::OsRng)),
            Cipher::EcdsaP384 => Self::EcdsaP384(p384::ecdsa::SigningKey::random(&mut rand_core::OsRng)),
            Cipher::Ed25519 => {
                Self::Ed25519Dalek(ed25519_dalek::SigningKey::generate(&mut rand_core::OsRng))
            }
            Cipher::Rsa => Self::Rsa(
                rsa::RsaPrivateKey::new(&mut rand_core::OsRng, crate::constants::RSA_KEY_BITS)
                    .map_err(|e| CmsError::InternalError(e.to_string()))?,
            ),
        })
    }

    pub fn cipher(&self) -> Cipher {
        match self {
            SigningKey::EcdsaP256(_) => Cipher::EcdsaP256,
            SigningKey::EcdsaP384(_) => Cipher::EcdsaP384,
            SigningKey::Ed25519Dalek(_) => Cipher::Ed25519,
            SigningKey::Rsa(_) => Cipher::Rsa,
        }
    }

    /// Signs `msg`. ECDSA and RSA sign the `digest` of the message, Ed25519 signs the message itself.
    ///
    /// ECDSA signatures are returned DER encoded, as CMS expects them.
    pub fn sign(&self, digest: DigestAlgorithm, msg: &[u8]) -> Result<Vec<u8>> {
        match self {
            SigningKey::EcdsaP256(key) => {
                let sig: p256::ecdsa::Signature = key
                    .sign_prehash(&digest.digest(msg))
                    .map_err(|_| CmsError::SigningFailed)?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            SigningKey::EcdsaP384(key) => {
                let sig: p384::ecdsa::Signature = key
                    .sign_prehash(&digest.digest(msg))
                    .map_err(|_| CmsError::SigningFailed)?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            SigningKey::Ed25519Dalek(key) => Ok(key.sign(msg).to_bytes().to_vec()),
            SigningKey::Rsa(key) => key
                .sign(pkcs1v15_padding(digest)?, &digest.digest(msg))
                .map_err(|_| CmsError::SigningFailed),
        }
    }

    /// Descriptor of the signature algorithm this key produces together with `digest`.
    pub fn signature_algorithm(&self, digest: DigestAlgorithm) -> AlgorithmDescriptor {
        match self {
            SigningKey::EcdsaP256(_) | SigningKey::EcdsaP384(_) => {
                AlgorithmDescriptor::composite("ECDSA", digest.descriptor())
            }
            SigningKey::Ed25519Dalek(_) => AlgorithmDescriptor::simple("Ed25519"),
            SigningKey::Rsa(_) => {
                AlgorithmDescriptor::composite("RSASSA-PKCS1-v1_5", digest.descriptor())
            }
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        match self {
            SigningKey::EcdsaP256(key) => VerifyingKey::EcdsaP256(key.verifying_key().clone()),
            SigningKey::EcdsaP384(key) => VerifyingKey::EcdsaP384(key.verifying_key().clone()),
            SigningKey::Ed25519Dalek(key) => VerifyingKey::Ed25519Dalek(key.verifying_key()),
            SigningKey::Rsa(key) => VerifyingKey::Rsa(key.to_public_key()),
        }
    }

    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let pubkey_der = match self {
            SigningKey::EcdsaP256(key) => key.verifying_key().to_public_key_der()?,
            SigningKey::EcdsaP384(key) => key.verifying_key().to_public_key_der()?,
            SigningKey::Ed25519Dalek(key) => key.verifying_key().to_public_key_der()?,
            SigningKey::Rsa(key) => key.to_public_key().to_public_key_der()?,
        };
        Ok(SubjectPublicKeyInfoOwned::from_der(pubkey_der.as_bytes())?)
    }
}

#[cfg(test)]
mod test {
    use super::{Cipher, SigningKey};
    use crate::crypto::digest::DigestAlgorithm;
    use crate::crypto::verify::VerifyingKey;
    use crate::AlgorithmDescriptor;
    use der::Encode;

    #[test]
    fn test_sign_verify_sha3() {
        for cipher in [Cipher::EcdsaP256, Cipher::EcdsaP384, Cipher::Ed25519] {
            let key = SigningKey::new(cipher).expect("failed to generate key");
            for digest in DigestAlgorithm::ALL {
                let sig = key.sign(digest, b"test message").expect("failed to sign");
                let spki_der = key.as_spki().unwrap().to_der().unwrap();
                let verifying_key = VerifyingKey::from_public_key_der(&spki_der).unwrap();
                assert!(verifying_key.verify(digest, b"test message", &sig).is_ok());
                assert!(verifying_key.verify(digest, b"other message", &sig).is_err());
            }
        }
    }

    #[test]
    fn test_signature_algorithm() {
        let key = SigningKey::new(Cipher::EcdsaP256).unwrap();
        assert_eq!(
            key.signature_algorithm(DigestAlgorithm::Sha3_384),
            AlgorithmDescriptor::composite("ECDSA", AlgorithmDescriptor::simple("SHA3-384"))
        );
        let key = SigningKey::new(Cipher::Ed25519).unwrap();
        assert_eq!(
            key.signature_algorithm(DigestAlgorithm::Sha512),
            AlgorithmDescriptor::simple("Ed25519")
        );
    }

    #[test]
    fn test_cipher_from_str() {
        assert_eq!("P-384".parse::<Cipher>().ok(), Some(Cipher::EcdsaP384));
        assert_eq!("ed25519".parse::<Cipher>().ok(), Some(Cipher::Ed25519));
        assert!("dsa".parse::<Cipher>().is_err());
    }
}
