use crate::{algorithm_oid, encode_oid_only};
use cms_sha3_common::AlgorithmDescriptor;
use const_oid::ObjectIdentifier;

/// Translates one algorithm (or family) between its descriptor and its DER encoding.
///
/// Both directions answer `None` when the input is not theirs, malformed input included.
/// A codec never fails in a way that would stop the registry from asking the next one.
pub trait AlgorithmCodec: Send + Sync {
    fn name(&self) -> &str;
    fn decode(&self, der: &[u8]) -> Option<AlgorithmDescriptor>;
    fn encode(&self, descriptor: &AlgorithmDescriptor) -> Option<Vec<u8>>;
}

/// Plain digest algorithm identified by its OID, e.g. SHA3-256.
#[derive(Debug, Clone)]
pub struct DigestCodec {
    oid: ObjectIdentifier,
    name: &'static str,
}

impl DigestCodec {
    pub const fn new(oid: ObjectIdentifier, name: &'static str) -> Self {
        Self { oid, name }
    }
}

impl AlgorithmCodec for DigestCodec {
    fn name(&self) -> &str {
        self.name
    }

    fn decode(&self, der: &[u8]) -> Option<AlgorithmDescriptor> {
        (algorithm_oid(der)? == self.oid).then(|| AlgorithmDescriptor::simple(self.name))
    }

    fn encode(&self, descriptor: &AlgorithmDescriptor) -> Option<Vec<u8>> {
        match descriptor {
            AlgorithmDescriptor::Simple(name) if name == self.name => encode_oid_only(self.oid),
            _ => None,
        }
    }
}

/// ECDSA combined with a fixed digest, e.g. `ecdsa-with-SHA3-256`.
#[derive(Debug, Clone)]
pub struct EcdsaDigestCodec {
    oid: ObjectIdentifier,
    name: String,
    hash: &'static str,
}

impl EcdsaDigestCodec {
    pub fn new(oid: ObjectIdentifier, hash: &'static str) -> Self {
        Self {
            oid,
            name: format!("ECDSA+{hash}"),
            hash,
        }
    }
}

impl AlgorithmCodec for EcdsaDigestCodec {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode(&self, der: &[u8]) -> Option<AlgorithmDescriptor> {
        (algorithm_oid(der)? == self.oid)
            .then(|| AlgorithmDescriptor::composite("ECDSA", AlgorithmDescriptor::simple(self.hash)))
    }

    fn encode(&self, descriptor: &AlgorithmDescriptor) -> Option<Vec<u8>> {
        match descriptor {
            AlgorithmDescriptor::Composite { name, hash }
                if name == "ECDSA" && hash.name() == self.hash =>
            {
                encode_oid_only(self.oid)
            }
            _ => None,
        }
    }
}

type DecodeFn = dyn Fn(&[u8]) -> Option<AlgorithmDescriptor> + Send + Sync;
type EncodeFn = dyn Fn(&AlgorithmDescriptor) -> Option<Vec<u8>> + Send + Sync;

/// Codec assembled from a pair of closures.
pub struct CodecEntry {
    name: String,
    decode: Box<DecodeFn>,
    encode: Box<EncodeFn>,
}

impl CodecEntry {
    pub fn new<D, E>(name: impl Into<String>, decode: D, encode: E) -> Self
    where
        D: Fn(&[u8]) -> Option<AlgorithmDescriptor> + Send + Sync + 'static,
        E: Fn(&AlgorithmDescriptor) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            decode: Box::new(decode),
            encode: Box::new(encode),
        }
    }
}

impl core::fmt::Debug for CodecEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CodecEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl AlgorithmCodec for CodecEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode(&self, der: &[u8]) -> Option<AlgorithmDescriptor> {
        (self.decode)(der)
    }

    fn encode(&self, descriptor: &AlgorithmDescriptor) -> Option<Vec<u8>> {
        (self.encode)(descriptor)
    }
}
