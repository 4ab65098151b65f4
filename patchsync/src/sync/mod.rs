//! Source synchronization.
//!
//! For each source the engine reads the resume state, selects the entries
//! of the patch index that are newer than it, and applies them one by one:
//!
//! 1. fetch the patch, retrying up to the policy's cap
//! 2. verify it against the checksum manifest, when there is a record
//! 3. write it into the output directory
//! 4. advance the resume state to its id
//!
//! The state is never advanced past an entry whose bytes are not yet on
//! disk. Any failure stops the source; what was applied stays applied and
//! the next run resumes from there.
//!
//! # Example
//!
//! ```no_run
//! use patchsync::config::SourceConfig;
//! use patchsync::fetch::HttpFetcher;
//! use patchsync::sync::SyncEngine;
//!
//! let source = SourceConfig::new(
//!     "kro",
//!     "/srv/mirror/kro",
//!     "https://patch.example.com/patch2.txt",
//!     "https://patch.example.com/patch/",
//! );
//!
//! let engine = SyncEngine::new(HttpFetcher::new()?);
//! let report = engine.sync_source(&source);
//! println!("{}: applied {}", report.source, report.applied);
//! # Ok::<(), patchsync::fetch::FetchError>(())
//! ```

mod engine;
mod error;
mod event;
mod report;

pub use engine::{SourceContext, SyncEngine};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use event::{EventCallback, SyncEvent};
pub use report::{SourceReport, SyncOutcome};
