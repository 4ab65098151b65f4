//! Error types for source synchronization.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::PreflightError;
use crate::fetch::{FetchError, RetryExhausted};
use crate::index::PatchEntry;
use crate::manifest::{ManifestError, MismatchKind};
use crate::state::StateError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// A condition that stops synchronization of one source.
///
/// Every variant is fatal for the source it occurred in. Entries applied
/// before the failure stay applied.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source failed its pre-run checks.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(#[from] PreflightError),

    /// The patch list could not be downloaded.
    #[error("failed to fetch patch list {url}: {source}")]
    IndexFetchFailed { url: String, source: FetchError },

    /// A configured checksum list could not be downloaded.
    #[error("failed to fetch checksum list {url}: {source}")]
    ManifestFetchFailed { url: String, source: FetchError },

    /// The checksum list is not valid JSON of the expected shape.
    #[error("failed to decode checksum list {url}: {source}")]
    ManifestDecodeFailed { url: String, source: ManifestError },

    /// Every download attempt for a patch failed.
    #[error("failed to download {}: {source}", .entry.filename)]
    PatchFetchExhausted {
        entry: PatchEntry,
        source: RetryExhausted,
    },

    /// A downloaded patch disagrees with its checksum record.
    #[error("file {} doesn't match {kind}", .entry.filename)]
    ChecksumMismatch {
        entry: PatchEntry,
        kind: MismatchKind,
    },

    /// The patch file could not be written to the output directory.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed {
        entry: PatchEntry,
        path: PathBuf,
        source: io::Error,
    },

    /// The patch was written but the resume state could not be advanced.
    #[error("failed to write patch state after {entry}: {source}")]
    StateWriteFailed {
        entry: PatchEntry,
        source: StateError,
    },

    /// The resume state file exists but could not be read.
    #[error("failed to read patch state: {0}")]
    StateReadFailed(#[source] StateError),

    /// The feed named a file outside the output directory.
    #[error("refusing to write unsafe filename '{}'", .entry.filename)]
    UnsafeFilename { entry: PatchEntry },

    /// A cancel request was honored before `entry` was started.
    #[error("interrupted")]
    Interrupted { entry: Option<PatchEntry> },
}

impl SyncError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigInvalid(_) => ErrorKind::ConfigInvalid,
            Self::IndexFetchFailed { .. } => ErrorKind::IndexFetchFailed,
            Self::ManifestFetchFailed { .. } => ErrorKind::ManifestFetchFailed,
            Self::ManifestDecodeFailed { .. } => ErrorKind::ManifestDecodeFailed,
            Self::PatchFetchExhausted { .. } => ErrorKind::PatchFetchExhausted,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::WriteFailed { .. } => ErrorKind::WriteFailed,
            Self::StateWriteFailed { .. } => ErrorKind::StateWriteFailed,
            Self::StateReadFailed(_) => ErrorKind::StateReadFailed,
            Self::UnsafeFilename { .. } => ErrorKind::UnsafeFilename,
            Self::Interrupted { .. } => ErrorKind::Interrupted,
        }
    }

    /// The patch entry that was in progress, if any.
    pub fn entry(&self) -> Option<&PatchEntry> {
        match self {
            Self::PatchFetchExhausted { entry, .. }
            | Self::ChecksumMismatch { entry, .. }
            | Self::WriteFailed { entry, .. }
            | Self::StateWriteFailed { entry, .. }
            | Self::UnsafeFilename { entry } => Some(entry),
            Self::Interrupted { entry } => entry.as_ref(),
            _ => None,
        }
    }
}

/// Serializable category of a [`SyncError`], one variant per error variant
/// with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigInvalid,
    IndexFetchFailed,
    ManifestFetchFailed,
    ManifestDecodeFailed,
    PatchFetchExhausted,
    ChecksumMismatch,
    WriteFailed,
    StateWriteFailed,
    StateReadFailed,
    UnsafeFilename,
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_entry() {
        let entry = PatchEntry::new(7, "patch.grf");
        let err = SyncError::ChecksumMismatch {
            entry: entry.clone(),
            kind: MismatchKind::Size {
                expected: 100,
                actual: 11,
            },
        };

        assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);
        assert_eq!(err.entry(), Some(&entry));
        assert_eq!(
            err.to_string(),
            "file patch.grf doesn't match size 100 downloaded size 11"
        );
    }

    #[test]
    fn test_source_level_errors_have_no_entry() {
        let err = SyncError::IndexFetchFailed {
            url: "http://h/list.txt".to_string(),
            source: FetchError::Status {
                url: "http://h/list.txt".to_string(),
                status: 404,
            },
        };
        assert_eq!(err.kind(), ErrorKind::IndexFetchFailed);
        assert!(err.entry().is_none());
        assert!(SyncError::Interrupted { entry: None }.entry().is_none());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PatchFetchExhausted).unwrap();
        assert_eq!(json, "\"patch_fetch_exhausted\"");
    }
}
