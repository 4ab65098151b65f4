//! PatchSync - incremental mirroring of remote patch feeds
//!
//! A remote source publishes an append-only list of numbered patch files.
//! This library keeps a local directory in step with it: it parses the
//! patch list, resumes after the last patch applied locally, downloads the
//! missing patches with a fixed retry cap, verifies them against an
//! optional checksum manifest and records progress one patch at a time, so
//! an interrupted run never skips a patch.
//!
//! # Modules
//!
//! - [`index`] - patch list parsing and resume selection
//! - [`manifest`] - checksum manifests and content digests
//! - [`state`] - resume state files and atomic writes
//! - [`fetch`] - the [`Fetcher`](fetch::Fetcher) capability and its HTTP implementation
//! - [`config`] - configuration files and preflight checks
//! - [`sync`] - the [`SyncEngine`](sync::SyncEngine)
//! - [`logging`] - subscriber setup

pub mod config;
pub mod fetch;
pub mod index;
pub mod logging;
pub mod manifest;
pub mod state;
pub mod sync;

pub use config::{ConfigFile, SourceConfig, SyncSettings};
pub use fetch::{Fetcher, HttpFetcher, RetryPolicy};
pub use index::PatchEntry;
pub use sync::{SourceReport, SyncEngine, SyncError, SyncOutcome};
