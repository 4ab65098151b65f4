//! Checksum manifests.
//!
//! A checksum manifest is an optional JSON document published next to a
//! patch index. It maps filenames to the expected digest and byte size of
//! each patch:
//!
//! ```json
//! {
//!     "2009-01-01data.gpf": { "hash": "5eb63bbbe01eeed093cb22bb8f5acdc3", "size": 11 }
//! }
//! ```
//!
//! Remote feeds are known to disagree on filename case, so keys are
//! lowercased at decode time and lookups lowercase the requested name.
//! A file with no record is "unknown, proceed"; only a record that
//! disagrees with the payload fails verification. Records are not checked
//! beyond their shape when decoded, so an odd record only affects the file
//! it describes.

mod checksum;

pub use checksum::{calculate_digest, HashAlgorithm};

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors that can occur while decoding a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest is not a JSON object of `{hash, size}` records.
    #[error("malformed checksum manifest: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Expected digest and size of one patch file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksumRecord {
    /// Filename, lowercased.
    pub filename: String,

    /// Lowercase hex digest.
    pub hash: String,

    /// Size in bytes.
    pub size: u64,
}

impl ChecksumRecord {
    /// The digest algorithm implied by the hash length, if supported.
    pub fn algorithm(&self) -> Option<HashAlgorithm> {
        HashAlgorithm::from_hex_len(self.hash.len())
    }
}

/// Which property of a payload disagreed with its checksum record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MismatchKind {
    /// The content digest differs.
    Hash { expected: String, actual: String },

    /// The byte length differs.
    Size { expected: u64, actual: u64 },

    /// The record's hash has no supported digest algorithm.
    UnsupportedDigest { expected: String },
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash { expected, actual } => {
                write!(f, "checksum {} calculated checksum {}", expected, actual)
            }
            Self::Size { expected, actual } => {
                write!(f, "size {} downloaded size {}", expected, actual)
            }
            Self::UnsupportedDigest { expected } => {
                write!(f, "checksum {} (unsupported digest)", expected)
            }
        }
    }
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The manifest has no record for the file.
    Unlisted,

    /// Digest and size both matched.
    Verified(HashAlgorithm),
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    hash: String,
    size: u64,
}

/// Per-source mapping from lowercased filename to its checksum record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    records: HashMap<String, ChecksumRecord>,
}

impl ChecksumManifest {
    /// Decode a manifest from raw JSON bytes.
    ///
    /// Keys and hashes are lowercased.
    pub fn decode(bytes: &[u8]) -> ManifestResult<Self> {
        let raw: BTreeMap<String, RawRecord> = serde_json::from_slice(bytes)?;
        let mut records = HashMap::with_capacity(raw.len());

        for (name, record) in raw {
            let filename = name.to_lowercase();
            let hash = record.hash.trim().to_lowercase();

            let record = ChecksumRecord {
                filename: filename.clone(),
                hash,
                size: record.size,
            };

            if let Some(previous) = records.insert(filename, record) {
                warn!(
                    filename = %previous.filename,
                    "duplicate checksum record after case folding, keeping the last one"
                );
            }
        }

        Ok(Self { records })
    }

    /// Look up the record for a filename, ignoring case.
    pub fn get(&self, filename: &str) -> Option<&ChecksumRecord> {
        self.records.get(&filename.to_lowercase())
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the manifest has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Verify a fetched payload against its record.
    ///
    /// The digest is compared first, then the size.
    pub fn verify(&self, filename: &str, data: &[u8]) -> Result<Verification, MismatchKind> {
        let Some(record) = self.get(filename) else {
            return Ok(Verification::Unlisted);
        };

        let Some(algorithm) = record.algorithm() else {
            return Err(MismatchKind::UnsupportedDigest {
                expected: record.hash.clone(),
            });
        };

        let actual = calculate_digest(algorithm, data);
        if actual != record.hash {
            return Err(MismatchKind::Hash {
                expected: record.hash.clone(),
                actual,
            });
        }

        let size = data.len() as u64;
        if size != record.size {
            return Err(MismatchKind::Size {
                expected: record.size,
                actual: size,
            });
        }

        Ok(Verification::Verified(algorithm))
    }
}
