//! Content digests for patch verification.
//!
//! Manifests publish lowercase hex digests. The algorithm is implied by the
//! digest length: 32 hex characters for MD5, 64 for SHA-256.

use md5::Md5;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Digest algorithm used by a checksum record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// MD5, 128-bit.
    Md5,
    /// SHA-256, 256-bit.
    Sha256,
}

impl HashAlgorithm {
    /// Infer the algorithm from the length of a hex digest.
    pub fn from_hex_len(len: usize) -> Option<Self> {
        [Self::Md5, Self::Sha256]
            .into_iter()
            .find(|algorithm| algorithm.hex_len() == len)
    }

    /// Length of this algorithm's digest in hex characters.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 => 64,
        }
    }

    /// Short lowercase name, as used in log output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }
}

/// Calculate the digest of `data`.
///
/// Returns the lowercase hexadecimal digest.
pub fn calculate_digest(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Md5 => format!("{:x}", Md5::digest(data)),
        HashAlgorithm::Sha256 => format!("{:x}", Sha256::digest(data)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_digest() {
        assert_eq!(
            calculate_digest(HashAlgorithm::Md5, b"hello world"),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[test]
    fn test_sha256_digest() {
        // SHA-256 of "hello world"
        assert_eq!(
            calculate_digest(HashAlgorithm::Sha256, b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_empty_input_digests() {
        assert_eq!(
            calculate_digest(HashAlgorithm::Md5, b""),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            calculate_digest(HashAlgorithm::Sha256, b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_algorithm_from_hex_len() {
        assert_eq!(HashAlgorithm::from_hex_len(32), Some(HashAlgorithm::Md5));
        assert_eq!(HashAlgorithm::from_hex_len(64), Some(HashAlgorithm::Sha256));
        assert_eq!(HashAlgorithm::from_hex_len(40), None);
        assert_eq!(HashAlgorithm::from_hex_len(0), None);
        assert_eq!(HashAlgorithm::Sha256.name(), "sha256");
    }

    #[test]
    fn test_digest_length_matches_algorithm() {
        for algorithm in [HashAlgorithm::Md5, HashAlgorithm::Sha256] {
            let digest = calculate_digest(algorithm, &[0xAB; 100_000]);
            assert_eq!(digest.len(), algorithm.hex_len());
            assert_eq!(HashAlgorithm::from_hex_len(digest.len()), Some(algorithm));
        }
    }
}
