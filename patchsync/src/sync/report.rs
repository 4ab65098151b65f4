//! Per-source outcome reports.

use serde::Serialize;

use super::{ErrorKind, SyncError};
use crate::index::PatchEntry;

/// How a source's sync ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Nothing newer than the resume state; no patch was fetched.
    UpToDate,

    /// Every pending entry was applied.
    Done,

    /// The source stopped on a fatal error.
    Failed {
        kind: ErrorKind,
        message: String,
        /// Entry in progress when the failure happened.
        entry: Option<PatchEntry>,
    },
}

/// Result of synchronizing one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    /// Source name.
    pub source: String,

    pub outcome: SyncOutcome,

    /// Resume id read at the start of the run.
    pub started_from: u64,

    /// Number of entries applied during this run.
    pub applied: usize,

    /// Total payload bytes written during this run.
    pub bytes: u64,
}

impl SourceReport {
    /// An empty report for `source`, marked as done.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            outcome: SyncOutcome::Done,
            started_from: 0,
            applied: 0,
            bytes: 0,
        }
    }

    /// Whether the source ended in `Done` or `UpToDate`.
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, SyncOutcome::Failed { .. })
    }

    /// Failure category, if the source failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            SyncOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Record `error` as the outcome.
    pub fn fail(&mut self, error: &SyncError) {
        self.outcome = SyncOutcome::Failed {
            kind: error.kind(),
            message: error.to_string(),
            entry: error.entry().cloned(),
        };
    }
}
