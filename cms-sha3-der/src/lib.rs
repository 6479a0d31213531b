//! DER side of the CMS signing pipeline.
//!
//! The [`registry::AlgorithmCodecRegistry`] translates between
//! [`AlgorithmDescriptor`]s and DER encoded `AlgorithmIdentifier`s for algorithms the
//! [`resolver::BuiltinAlgorithms`] table does not know, most notably the SHA-3 family.
//! A [`resolver::ResolverChain`] consults the registry first and the built-in table second.

pub mod codec;
pub mod ess;
pub mod registry;
pub mod resolver;

use const_oid::ObjectIdentifier;
use der::{Decode, Encode};
use spki::{AlgorithmIdentifierOwned, AlgorithmIdentifierRef};

pub use cms_sha3_common::AlgorithmDescriptor;
pub use registry::AlgorithmCodecRegistry;
pub use resolver::{AlgorithmResolver, ResolverChain};

/// Parses `der` as an `AlgorithmIdentifier` and returns its OID, parameters are ignored.
pub fn algorithm_oid(der: &[u8]) -> Option<ObjectIdentifier> {
    AlgorithmIdentifierRef::from_der(der).ok().map(|alg| alg.oid)
}

/// Encodes an `AlgorithmIdentifier` consisting of `oid` only, the parameters field is absent.
pub fn encode_oid_only(oid: ObjectIdentifier) -> Option<Vec<u8>> {
    AlgorithmIdentifierOwned {
        oid,
        parameters: None,
    }
    .to_der()
    .ok()
}
