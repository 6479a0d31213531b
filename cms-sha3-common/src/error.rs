use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmsError {
    #[error("DER encoding or decoding failed {0:?}")]
    Der(#[from] der::Error),
    #[error("failed to encode or decode a public key {0:?}")]
    Spki(#[from] spki::Error),
    #[error("algorithm is not supported: {0}")]
    UnsupportedAlgorithm(String),
    #[error("no encoder or decoder is registered for algorithm {0}")]
    UnknownAlgorithm(String),
    #[error("the public key could not be decoded")]
    DecodingPublicKeyFailed,
    #[error("the signature could not be decoded")]
    DecodingSignatureFailed,
    #[error("creating the signature failed")]
    SigningFailed,
    #[error("signature does not match")]
    InvalidSignature,
    #[error("container of {size} bytes exceeds the reserved budget of {budget} bytes")]
    ContainerTooLarge { size: usize, budget: usize },
    #[error("malformed signature field: {0}")]
    MalformedField(String),
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),
    #[error("error during I/O {0:?}")]
    IoError(#[from] std::io::Error),
    #[error("hex decode failed {0:?}")]
    HexDecodingError(#[from] hex::FromHexError),
    #[error("internal error {0}")]
    InternalError(String),
}
