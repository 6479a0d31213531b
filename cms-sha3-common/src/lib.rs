pub mod constants;
pub mod crypto;
pub mod error;

use core::fmt;

pub use error::CmsError;

pub type Result<T> = core::result::Result<T, CmsError>;

/// Abstract description of an algorithm, independent of its encoding.
///
/// Signature schemes that are parametrized by a hash function, e.g. ECDSA, are
/// described as [`AlgorithmDescriptor::Composite`], everything else as
/// [`AlgorithmDescriptor::Simple`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlgorithmDescriptor {
    Simple(String),
    Composite {
        name: String,
        hash: Box<AlgorithmDescriptor>,
    },
}

impl AlgorithmDescriptor {
    pub fn simple(name: impl Into<String>) -> Self {
        Self::Simple(name.into())
    }

    pub fn composite(name: impl Into<String>, hash: AlgorithmDescriptor) -> Self {
        Self::Composite {
            name: name.into(),
            hash: Box::new(hash),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AlgorithmDescriptor::Simple(name) => name,
            AlgorithmDescriptor::Composite { name, .. } => name,
        }
    }

    /// The nested hash algorithm of a composite descriptor.
    pub fn hash(&self) -> Option<&AlgorithmDescriptor> {
        match self {
            AlgorithmDescriptor::Simple(_) => None,
            AlgorithmDescriptor::Composite { hash, .. } => Some(hash),
        }
    }
}

impl fmt::Display for AlgorithmDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmDescriptor::Simple(name) => write!(f, "{name}"),
            AlgorithmDescriptor::Composite { name, hash } => write!(f, "{name}+{hash}"),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::AlgorithmDescriptor;

    #[test]
    fn test_eq() {
        let a = AlgorithmDescriptor::composite("ECDSA", AlgorithmDescriptor::simple("SHA3-256"));
        let b = AlgorithmDescriptor::composite("ECDSA", AlgorithmDescriptor::simple("SHA3-256"));
        let c = AlgorithmDescriptor::composite("ECDSA", AlgorithmDescriptor::simple("SHA3-384"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, AlgorithmDescriptor::simple("ECDSA"));
        assert_eq!(a.name(), "ECDSA");
        assert_eq!(a.hash(), Some(&AlgorithmDescriptor::simple("SHA3-256")));
        assert_eq!(AlgorithmDescriptor::simple("SHAKE128").hash(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            AlgorithmDescriptor::composite("ECDSA", AlgorithmDescriptor::simple("SHA3-512"))
                .to_string(),
            "ECDSA+SHA3-512"
        );
        assert_eq!(AlgorithmDescriptor::simple("SHAKE256").to_string(), "SHAKE256");
    }
}
