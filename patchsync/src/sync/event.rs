//! Progress events emitted while a source is synchronized.
//!
//! Events carry everything an operator-facing front end needs to print
//! status lines or drive a progress bar. They borrow from the engine and are
//! only valid for the duration of the callback.

use crate::fetch::FetchError;
use crate::index::PatchEntry;

use super::SyncError;

/// Callback receiving sync events.
pub type EventCallback = Box<dyn Fn(&SyncEvent<'_>) + Send + Sync>;

/// Something observable happened during a sync.
#[derive(Debug)]
pub enum SyncEvent<'a> {
    /// Processing of a source has begun.
    SourceStarted { source: &'a str },

    /// No entry in the feed is newer than the resume state.
    UpToDate { source: &'a str, last_applied: u64 },

    /// Pending entries were found; `first` is applied next.
    Starting {
        source: &'a str,
        first: &'a PatchEntry,
        pending: usize,
    },

    /// A download attempt is starting. `position` is 1-based.
    Attempt {
        source: &'a str,
        entry: &'a PatchEntry,
        position: usize,
        pending: usize,
        attempt: u32,
        max_attempts: u32,
    },

    /// A download attempt failed.
    AttemptFailed {
        source: &'a str,
        entry: &'a PatchEntry,
        attempt: u32,
        error: &'a FetchError,
    },

    /// The manifest has no record for the entry; it is applied unverified.
    Unlisted {
        source: &'a str,
        entry: &'a PatchEntry,
    },

    /// The entry was written and the resume state advanced to its id.
    Applied {
        source: &'a str,
        entry: &'a PatchEntry,
        position: usize,
        pending: usize,
        bytes: u64,
    },

    /// Every pending entry was applied.
    Finished { source: &'a str, applied: usize },

    /// The source stopped on a fatal error.
    Failed {
        source: &'a str,
        error: &'a SyncError,
    },
}

impl SyncEvent<'_> {
    /// Name of the source the event belongs to.
    pub fn source(&self) -> &str {
        match self {
            Self::SourceStarted { source }
            | Self::UpToDate { source, .. }
            | Self::Starting { source, .. }
            | Self::Attempt { source, .. }
            | Self::AttemptFailed { source, .. }
            | Self::Unlisted { source, .. }
            | Self::Applied { source, .. }
            | Self::Finished { source, .. }
            | Self::Failed { source, .. } => source,
        }
    }
}
