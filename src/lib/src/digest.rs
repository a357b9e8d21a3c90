use crate::oid;
use der::asn1::ObjectIdentifier;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Digest algorithms a SignerInfo may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        if *oid == oid::ID_SHA256 {
            Some(DigestAlgorithm::Sha256)
        } else if *oid == oid::ID_SHA384 {
            Some(DigestAlgorithm::Sha384)
        } else if *oid == oid::ID_SHA512 {
            Some(DigestAlgorithm::Sha512)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    /// One-shot digest of `data`.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = Hasher::new(*self);
        hasher.update(data);
        hasher.finalize()
    }
}

#[derive(Clone)]
enum State {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

/// Streaming digest context.
#[derive(Clone)]
pub struct Hasher {
    state: State,
}

impl Hasher {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        let state = match algorithm {
            DigestAlgorithm::Sha256 => State::Sha256(Sha256::new()),
            DigestAlgorithm::Sha384 => State::Sha384(Sha384::new()),
            DigestAlgorithm::Sha512 => State::Sha512(Sha512::new()),
        };
        Hasher { state }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        match self.state {
            State::Sha256(_) => DigestAlgorithm::Sha256,
            State::Sha384(_) => DigestAlgorithm::Sha384,
            State::Sha512(_) => DigestAlgorithm::Sha512,
        }
    }

    pub fn update<T: AsRef<[u8]>>(&mut self, data: T) {
        match &mut self.state {
            State::Sha256(h) => h.update(data),
            State::Sha384(h) => h.update(data),
            State::Sha512(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self.state {
            State::Sha256(h) => h.finalize().to_vec(),
            State::Sha384(h) => h.finalize().to_vec(),
            State::Sha512(h) => h.finalize().to_vec(),
        }
    }

    /// Finish the digest and leave the context empty.
    pub fn finalize_reset(&mut self) -> Vec<u8> {
        match &mut self.state {
            State::Sha256(h) => h.finalize_reset().to_vec(),
            State::Sha384(h) => h.finalize_reset().to_vec(),
            State::Sha512(h) => h.finalize_reset().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_WORLD_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_hash_known_vector() {
        let digest = DigestAlgorithm::Sha256.digest(b"hello world");
        assert_eq!(hex::encode(digest), HELLO_WORLD_SHA256);
    }

    #[test]
    fn test_output_lengths() {
        for (alg, len) in [
            (DigestAlgorithm::Sha256, 32),
            (DigestAlgorithm::Sha384, 48),
            (DigestAlgorithm::Sha512, 64),
        ] {
            assert_eq!(alg.digest(b"").len(), len);
            assert_eq!(Hasher::new(alg).algorithm(), alg);
        }
    }

    #[test]
    fn test_hash_update_multiple() {
        let mut hash1 = Hasher::new(DigestAlgorithm::Sha384);
        hash1.update(b"hello");
        hash1.update(b" ");
        hash1.update(b"world");

        let mut hash2 = Hasher::new(DigestAlgorithm::Sha384);
        hash2.update(b"hello world");

        assert_eq!(hash1.finalize(), hash2.finalize());
    }

    #[test]
    fn test_finalize_reset() {
        let mut hash = Hasher::new(DigestAlgorithm::Sha512);
        hash.update(b"data");
        let first = hash.finalize_reset();
        assert_eq!(first, DigestAlgorithm::Sha512.digest(b"data"));
        assert_eq!(hash.finalize_reset(), DigestAlgorithm::Sha512.digest(b""));
    }

    #[test]
    fn test_oid_mapping() {
        for (oid, alg) in [
            (oid::ID_SHA256, DigestAlgorithm::Sha256),
            (oid::ID_SHA384, DigestAlgorithm::Sha384),
            (oid::ID_SHA512, DigestAlgorithm::Sha512),
        ] {
            assert_eq!(DigestAlgorithm::from_oid(&oid), Some(alg));
        }
        let sha1 = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
        assert_eq!(DigestAlgorithm::from_oid(&sha1), None);
    }
}
