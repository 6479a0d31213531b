use crate::constants::{SHAKE128_OUTPUT_LEN, SHAKE256_OUTPUT_LEN};
use crate::{AlgorithmDescriptor, CmsError};
use core::str::FromStr;
use sha2::{Digest, Sha256, Sha384, Sha512};
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Sha3_256, Sha3_384, Sha3_512, Shake128, Shake256};

/// Digest algorithms that can be used for signed attributes and message digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    Shake128,
    Shake256,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 8] = [
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
        DigestAlgorithm::Sha3_256,
        DigestAlgorithm::Sha3_384,
        DigestAlgorithm::Sha3_512,
        DigestAlgorithm::Shake128,
        DigestAlgorithm::Shake256,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
            DigestAlgorithm::Sha3_256 => "SHA3-256",
            DigestAlgorithm::Sha3_384 => "SHA3-384",
            DigestAlgorithm::Sha3_512 => "SHA3-512",
            DigestAlgorithm::Shake128 => "SHAKE128",
            DigestAlgorithm::Shake256 => "SHAKE256",
        }
    }

    /// Looks up an algorithm by its name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(name))
    }

    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 | DigestAlgorithm::Sha3_256 => 32,
            DigestAlgorithm::Sha384 | DigestAlgorithm::Sha3_384 => 48,
            DigestAlgorithm::Sha512 | DigestAlgorithm::Sha3_512 => 64,
            DigestAlgorithm::Shake128 => SHAKE128_OUTPUT_LEN,
            DigestAlgorithm::Shake256 => SHAKE256_OUTPUT_LEN,
        }
    }

    /// Extendable output functions have no fixed length and no PKCS#1 DigestInfo.
    pub fn is_xof(&self) -> bool {
        matches!(self, DigestAlgorithm::Shake128 | DigestAlgorithm::Shake256)
    }

    pub fn descriptor(&self) -> AlgorithmDescriptor {
        AlgorithmDescriptor::simple(self.name())
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => <Sha256 as Digest>::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => <Sha384 as Digest>::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => <Sha512 as Digest>::digest(data).to_vec(),
            DigestAlgorithm::Sha3_256 => <Sha3_256 as Digest>::digest(data).to_vec(),
            DigestAlgorithm::Sha3_384 => <Sha3_384 as Digest>::digest(data).to_vec(),
            DigestAlgorithm::Sha3_512 => <Sha3_512 as Digest>::digest(data).to_vec(),
            DigestAlgorithm::Shake128 => xof::<Shake128>(data, SHAKE128_OUTPUT_LEN),
            DigestAlgorithm::Shake256 => xof::<Shake256>(data, SHAKE256_OUTPUT_LEN),
        }
    }
}

fn xof<X: Default + Update + ExtendableOutput>(data: &[u8], len: usize) -> Vec<u8> {
    let mut hasher = X::default();
    Update::update(&mut hasher, data);
    let mut out = vec![0u8; len];
    hasher.finalize_xof().read(&mut out);
    out
}

impl FromStr for DigestAlgorithm {
    type Err = CmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| CmsError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl TryFrom<&AlgorithmDescriptor> for DigestAlgorithm {
    type Error = CmsError;

    fn try_from(value: &AlgorithmDescriptor) -> Result<Self, Self::Error> {
        match value {
            AlgorithmDescriptor::Simple(name) => name.parse(),
            composite => Err(CmsError::UnsupportedAlgorithm(composite.to_string())),
        }
    }
}
