use crate::codec::{AlgorithmCodec, DigestCodec, EcdsaDigestCodec};
use cms_sha3_common::constants::{
    ID_ECDSA_WITH_SHA3_256, ID_ECDSA_WITH_SHA3_384, ID_ECDSA_WITH_SHA3_512, ID_SHA3_256,
    ID_SHA3_384, ID_SHA3_512, ID_SHAKE128, ID_SHAKE256,
};
use cms_sha3_common::AlgorithmDescriptor;
use tracing::trace;

/// Ordered, append-only list of [`AlgorithmCodec`]s.
///
/// Lookups walk the entries in registration order and the first codec that answers wins,
/// in both directions. Registering the same name twice keeps both entries.
///
/// The registry is filled once during startup and then shared read-only, usually
/// behind an [`std::sync::Arc`].
#[derive(Default)]
pub struct AlgorithmCodecRegistry {
    entries: Vec<Box<dyn AlgorithmCodec>>,
}

impl AlgorithmCodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the SHA-3 digests, SHAKE128/256 and ECDSA with SHA-3.
    pub fn sha3() -> Self {
        Self::new()
            .with(DigestCodec::new(ID_SHAKE128, "SHAKE128"))
            .with(DigestCodec::new(ID_SHAKE256, "SHAKE256"))
            .with(DigestCodec::new(ID_SHA3_256, "SHA3-256"))
            .with(DigestCodec::new(ID_SHA3_384, "SHA3-384"))
            .with(DigestCodec::new(ID_SHA3_512, "SHA3-512"))
            .with(EcdsaDigestCodec::new(ID_ECDSA_WITH_SHA3_256, "SHA3-256"))
            .with(EcdsaDigestCodec::new(ID_ECDSA_WITH_SHA3_384, "SHA3-384"))
            .with(EcdsaDigestCodec::new(ID_ECDSA_WITH_SHA3_512, "SHA3-512"))
    }

    pub fn register(&mut self, codec: impl AlgorithmCodec + 'static) -> &mut Self {
        self.entries.push(Box::new(codec));
        self
    }

    pub fn with(mut self, codec: impl AlgorithmCodec + 'static) -> Self {
        self.register(codec);
        self
    }

    pub fn decode(&self, der: &[u8]) -> Option<AlgorithmDescriptor> {
        self.entries.iter().find_map(|codec| {
            let decoded = codec.decode(der);
            if decoded.is_some() {
                trace!("decoded algorithm with codec {}", codec.name());
            }
            decoded
        })
    }

    pub fn encode(&self, descriptor: &AlgorithmDescriptor) -> Option<Vec<u8>> {
        self.entries.iter().find_map(|codec| {
            let encoded = codec.encode(descriptor);
            if encoded.is_some() {
                trace!("encoded {descriptor} with codec {}", codec.name());
            }
            encoded
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|codec| codec.name())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl core::fmt::Debug for AlgorithmCodecRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
