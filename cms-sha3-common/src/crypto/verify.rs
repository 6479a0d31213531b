use crate::crypto::digest::DigestAlgorithm;
use crate::crypto::pkcs1v15_padding;
use crate::{CmsError, Result};
use const_oid::db::rfc5912::{ID_EC_PUBLIC_KEY, RSA_ENCRYPTION, SECP_256_R_1, SECP_384_R_1};
use const_oid::db::rfc8410::ID_ED_25519;
use der::{Decode, Encode};
use signature::hazmat::PrehashVerifier;
use signature::Verifier;
use spki::{DecodePublicKey, SubjectPublicKeyInfoOwned, SubjectPublicKeyInfoRef};

/// Public key of a certificate, able to check signatures made by [`super::sign::SigningKey`].
#[derive(Debug, Clone)]
pub enum VerifyingKey {
    EcdsaP256(p256::ecdsa::VerifyingKey),
    EcdsaP384(p384::ecdsa::VerifyingKey),
    Ed25519Dalek(ed25519_dalek::VerifyingKey),
    Rsa(rsa::RsaPublicKey),
}

impl VerifyingKey {
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        Self::from_public_key_der(&spki.to_der()?)
    }

    pub fn from_public_key_der(der: &[u8]) -> Result<Self> {
        let spki = SubjectPublicKeyInfoRef::from_der(der)?;
        match spki.algorithm.oid {
            ID_EC_PUBLIC_KEY => match spki.algorithm.parameters_oid()? {
                SECP_256_R_1 => p256::ecdsa::VerifyingKey::from_public_key_der(der)
                    .map(Self::EcdsaP256)
                    .map_err(|_| CmsError::DecodingPublicKeyFailed),
                SECP_384_R_1 => p384::ecdsa::VerifyingKey::from_public_key_der(der)
                    .map(Self::EcdsaP384)
                    .map_err(|_| CmsError::DecodingPublicKeyFailed),
                curve => Err(CmsError::UnsupportedAlgorithm(format!("named curve {curve}"))),
            },
            ID_ED_25519 => ed25519_dalek::VerifyingKey::from_public_key_der(der)
                .map(Self::Ed25519Dalek)
                .map_err(|_| CmsError::DecodingPublicKeyFailed),
            RSA_ENCRYPTION => rsa::RsaPublicKey::from_public_key_der(der)
                .map(Self::Rsa)
                .map_err(|_| CmsError::DecodingPublicKeyFailed),
            oid => Err(CmsError::UnsupportedAlgorithm(format!("public key {oid}"))),
        }
    }

    /// Checks `sig` over `msg`, hashing with `digest` where the scheme is hash-then-sign.
    pub fn verify(&self, digest: DigestAlgorithm, msg: &[u8], sig: &[u8]) -> Result<()> {
        match self {
            VerifyingKey::EcdsaP256(key) => {
                let sig = p256::ecdsa::Signature::from_der(sig)
                    .map_err(|_| CmsError::DecodingSignatureFailed)?;
                key.verify_prehash(&digest.digest(msg), &sig)
                    .map_err(|_| CmsError::InvalidSignature)
            }
            VerifyingKey::EcdsaP384(key) => {
                let sig = p384::ecdsa::Signature::from_der(sig)
                    .map_err(|_| CmsError::DecodingSignatureFailed)?;
                key.verify_prehash(&digest.digest(msg), &sig)
                    .map_err(|_| CmsError::InvalidSignature)
            }
            VerifyingKey::Ed25519Dalek(key) => {
                let sig = ed25519_dalek::Signature::from_slice(sig)
                    .map_err(|_| CmsError::DecodingSignatureFailed)?;
                key.verify(msg, &sig).map_err(|_| CmsError::InvalidSignature)
            }
            VerifyingKey::Rsa(key) => key
                .verify(pkcs1v15_padding(digest)?, &digest.digest(msg), sig)
                .map_err(|_| CmsError::InvalidSignature),
        }
    }

    /// Whether this key can check signatures of the scheme called `name`, e.g. `ECDSA`.
    pub fn supports(&self, name: &str) -> bool {
        match self {
            VerifyingKey::EcdsaP256(_) | VerifyingKey::EcdsaP384(_) => name == "ECDSA",
            VerifyingKey::Ed25519Dalek(_) => name == "Ed25519",
            VerifyingKey::Rsa(_) => name == "RSASSA-PKCS1-v1_5",
        }
    }

    /// Name of the elliptic curve for ECDSA keys.
    pub fn named_curve(&self) -> Option<&'static str> {
        match self {
            VerifyingKey::EcdsaP256(_) => Some("P-256"),
            VerifyingKey::EcdsaP384(_) => Some("P-384"),
            VerifyingKey::Ed25519Dalek(_) | VerifyingKey::Rsa(_) => None,
        }
    }
}
