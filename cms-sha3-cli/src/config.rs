use cms_sha3::{Cipher, DEFAULT_CONTAINER_SIZE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Data structure to parse/store configurations
///
/// ```yaml
/// sign:
///   digest: SHA3-256
///   leaf: ecdsa-p256
///   root: rsa
///   container_size: 8192
///   reason: Approval
///   out: out
/// trust:
///   evaluator: roots
///   roots:
///     - out/root.pem
/// ```
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub sign: SignConfig,
    pub trust: TrustConfig,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SignConfig {
    pub digest: String,
    pub leaf: KeyKind,
    pub root: KeyKind,
    pub container_size: usize,
    pub reason: Option<String>,
    pub location: Option<String>,
    /// directory to store the output
    pub out: PathBuf,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            digest: "SHA3-256".to_string(),
            leaf: KeyKind::EcdsaP256,
            root: KeyKind::Rsa,
            container_size: DEFAULT_CONTAINER_SIZE,
            reason: None,
            location: None,
            out: PathBuf::from("out"),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TrustConfig {
    pub evaluator: EvaluatorKind,
    /// DER or PEM encoded certificates used by [`EvaluatorKind::Roots`]
    pub roots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KeyKind {
    EcdsaP256,
    EcdsaP384,
    Ed25519,
    Rsa,
}

impl KeyKind {
    /// Label used in output file names, e.g. `ECDSA P-256`.
    pub fn label(&self) -> &'static str {
        match self {
            KeyKind::EcdsaP256 => "ECDSA P-256",
            KeyKind::EcdsaP384 => "ECDSA P-384",
            KeyKind::Ed25519 => "Ed25519",
            KeyKind::Rsa => "RSA",
        }
    }
}

impl From<KeyKind> for Cipher {
    fn from(value: KeyKind) -> Self {
        match value {
            KeyKind::EcdsaP256 => Cipher::EcdsaP256,
            KeyKind::EcdsaP384 => Cipher::EcdsaP384,
            KeyKind::Ed25519 => Cipher::Ed25519,
            KeyKind::Rsa => Cipher::Rsa,
        }
    }
}

/// Trust evaluator, spelled the same in YAML and on the command line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorKind {
    /// trust every self-signed certificate
    #[default]
    #[value(name = "self_signed")]
    SelfSigned,
    /// trust nothing
    #[serde(rename = "none")]
    #[value(name = "none")]
    Null,
    /// trust the configured roots
    Roots,
}
