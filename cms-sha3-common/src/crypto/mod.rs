pub mod digest;
pub mod sign;
pub mod verify;

use crate::crypto::digest::DigestAlgorithm;
use crate::CmsError;
use rsa::Pkcs1v15Sign;

/// PKCS#1 v1.5 padding with the DigestInfo prefix of the given hash.
pub(crate) fn pkcs1v15_padding(digest: DigestAlgorithm) -> Result<Pkcs1v15Sign, CmsError> {
    Ok(match digest {
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        DigestAlgorithm::Sha3_256 => Pkcs1v15Sign::new::<sha3::Sha3_256>(),
        DigestAlgorithm::Sha3_384 => Pkcs1v15Sign::new::<sha3::Sha3_384>(),
        DigestAlgorithm::Sha3_512 => Pkcs1v15Sign::new::<sha3::Sha3_512>(),
        DigestAlgorithm::Shake128 | DigestAlgorithm::Shake256 => {
            return Err(CmsError::UnsupportedAlgorithm(format!(
                "RSASSA-PKCS1-v1_5 with {}",
                digest.name()
            )))
        }
    })
}
