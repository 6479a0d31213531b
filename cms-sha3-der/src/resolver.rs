use crate::registry::AlgorithmCodecRegistry;
use crate::algorithm_oid;
use cms_sha3_common::{AlgorithmDescriptor, CmsError, Result};
use const_oid::db::rfc5912::{
    ECDSA_WITH_SHA_256, ECDSA_WITH_SHA_384, ECDSA_WITH_SHA_512, ID_SHA_256, ID_SHA_384,
    ID_SHA_512, RSA_ENCRYPTION, SHA_256_WITH_RSA_ENCRYPTION, SHA_384_WITH_RSA_ENCRYPTION,
    SHA_512_WITH_RSA_ENCRYPTION,
};
use const_oid::db::rfc8410::ID_ED_25519;
use const_oid::ObjectIdentifier;
use der::asn1::AnyRef;
use der::{Any, Decode, Encode};
use spki::AlgorithmIdentifierOwned;
use std::sync::Arc;
use tracing::debug;

/// Two-way mapping between algorithm descriptors and DER encoded `AlgorithmIdentifier`s.
pub trait AlgorithmResolver {
    fn decode(&self, der: &[u8]) -> Option<AlgorithmDescriptor>;
    fn encode(&self, descriptor: &AlgorithmDescriptor) -> Option<Vec<u8>>;
}

impl AlgorithmResolver for AlgorithmCodecRegistry {
    fn decode(&self, der: &[u8]) -> Option<AlgorithmDescriptor> {
        AlgorithmCodecRegistry::decode(self, der)
    }

    fn encode(&self, descriptor: &AlgorithmDescriptor) -> Option<Vec<u8>> {
        AlgorithmCodecRegistry::encode(self, descriptor)
    }
}

struct Builtin {
    oid: ObjectIdentifier,
    name: &'static str,
    hash: Option<&'static str>,
    /// RSA identifiers carry an explicit NULL parameter.
    null_parameters: bool,
}

const fn builtin(
    oid: ObjectIdentifier,
    name: &'static str,
    hash: Option<&'static str>,
    null_parameters: bool,
) -> Builtin {
    Builtin {
        oid,
        name,
        hash,
        null_parameters,
    }
}

const BUILTIN: &[Builtin] = &[
    builtin(ID_SHA_256, "SHA-256", None, false),
    builtin(ID_SHA_384, "SHA-384", None, false),
    builtin(ID_SHA_512, "SHA-512", None, false),
    builtin(ECDSA_WITH_SHA_256, "ECDSA", Some("SHA-256"), false),
    builtin(ECDSA_WITH_SHA_384, "ECDSA", Some("SHA-384"), false),
    builtin(ECDSA_WITH_SHA_512, "ECDSA", Some("SHA-512"), false),
    builtin(SHA_256_WITH_RSA_ENCRYPTION, "RSASSA-PKCS1-v1_5", Some("SHA-256"), true),
    builtin(SHA_384_WITH_RSA_ENCRYPTION, "RSASSA-PKCS1-v1_5", Some("SHA-384"), true),
    builtin(SHA_512_WITH_RSA_ENCRYPTION, "RSASSA-PKCS1-v1_5", Some("SHA-512"), true),
    builtin(RSA_ENCRYPTION, "RSASSA-PKCS1-v1_5", None, true),
    builtin(ID_ED_25519, "Ed25519", None, false),
];

impl Builtin {
    fn descriptor(&self) -> AlgorithmDescriptor {
        match self.hash {
            None => AlgorithmDescriptor::simple(self.name),
            Some(hash) => {
                AlgorithmDescriptor::composite(self.name, AlgorithmDescriptor::simple(hash))
            }
        }
    }

    fn matches(&self, descriptor: &AlgorithmDescriptor) -> bool {
        descriptor.name() == self.name && descriptor.hash().map(|h| h.name()) == self.hash
    }
}

/// Algorithms known without any registration: SHA-2, ECDSA and RSA with SHA-2, Ed25519.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinAlgorithms;

impl AlgorithmResolver for BuiltinAlgorithms {
    fn decode(&self, der: &[u8]) -> Option<AlgorithmDescriptor> {
        let oid = algorithm_oid(der)?;
        BUILTIN
            .iter()
            .find(|entry| entry.oid == oid)
            .map(Builtin::descriptor)
    }

    fn encode(&self, descriptor: &AlgorithmDescriptor) -> Option<Vec<u8>> {
        let entry = BUILTIN.iter().find(|entry| entry.matches(descriptor))?;
        AlgorithmIdentifierOwned {
            oid: entry.oid,
            parameters: entry.null_parameters.then(|| Any::from(AnyRef::NULL)),
        }
        .to_der()
        .ok()
    }
}

/// Resolves algorithms through the registry first and the built-in table second.
#[derive(Debug, Clone)]
pub struct ResolverChain {
    registry: Arc<AlgorithmCodecRegistry>,
    fallback: BuiltinAlgorithms,
}

impl ResolverChain {
    pub fn new(registry: Arc<AlgorithmCodecRegistry>) -> Self {
        Self {
            registry,
            fallback: BuiltinAlgorithms,
        }
    }

    pub fn registry(&self) -> &AlgorithmCodecRegistry {
        &self.registry
    }

    /// Resolves a parsed `AlgorithmIdentifier`, failing with [`CmsError::UnknownAlgorithm`].
    pub fn decode_algorithm(&self, algorithm: &AlgorithmIdentifierOwned) -> Result<AlgorithmDescriptor> {
        let der = algorithm.to_der()?;
        self.decode(&der)
            .ok_or_else(|| CmsError::UnknownAlgorithm(algorithm.oid.to_string()))
    }

    /// Encodes a descriptor into an `AlgorithmIdentifier`, failing with [`CmsError::UnknownAlgorithm`].
    pub fn encode_algorithm(&self, descriptor: &AlgorithmDescriptor) -> Result<AlgorithmIdentifierOwned> {
        let der = self
            .encode(descriptor)
            .ok_or_else(|| CmsError::UnknownAlgorithm(descriptor.to_string()))?;
        Ok(AlgorithmIdentifierOwned::from_der(&der)?)
    }
}

impl AlgorithmResolver for ResolverChain {
    fn decode(&self, der: &[u8]) -> Option<AlgorithmDescriptor> {
        self.registry.decode(der).or_else(|| {
            debug!("algorithm not in registry, falling back to built-in table");
            self.fallback.decode(der)
        })
    }

    fn encode(&self, descriptor: &AlgorithmDescriptor) -> Option<Vec<u8>> {
        self.registry.encode(descriptor).or_else(|| {
            debug!("no registered encoder for {descriptor}, falling back to built-in table");
            self.fallback.encode(descriptor)
        })
    }
}
