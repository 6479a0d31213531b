//! Signing and verification of detached CMS signatures embedded into artifacts.
//!
//! Algorithm identifiers that the built-in tables do not know, such as the SHA-3 and
//! SHAKE families, are resolved through an [`AlgorithmCodecRegistry`] that is created once
//! and shared between the [`SigningOrchestrator`] and the [`SignatureVerificationEngine`].

pub mod artifact;
pub mod builder;
pub mod certificate;
pub mod report;
pub mod sign;
pub mod trust;
pub mod verify;

pub use artifact::{SignatureField, SignatureSubFilter, DEFAULT_CONTAINER_SIZE};
pub use builder::{CertificateChain, SigningCertificate};
pub use cms_sha3_common::crypto::digest::DigestAlgorithm;
pub use cms_sha3_common::crypto::sign::Cipher;
pub use cms_sha3_common::{AlgorithmDescriptor, CmsError, Result};
pub use cms_sha3_der::{AlgorithmCodecRegistry, ResolverChain};
pub use report::{SignatureReport, StateCode, StateKind, VerificationReport, VerificationState};
pub use sign::{CmsContainer, ContainerOptions, SigningOrchestrator};
pub use trust::{
    NullTrustEvaluator, SelfSignedTrustEvaluator, TrustEvaluator, TrustResult, TrustStoreEvaluator,
};
pub use verify::SignatureVerificationEngine;
