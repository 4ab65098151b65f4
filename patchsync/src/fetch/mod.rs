//! Remote retrieval.
//!
//! The sync engine needs two capabilities from the network: fetch the bytes
//! behind a URI and check whether a URI exists. [`Fetcher`] captures exactly
//! that, so the engine can run against HTTP in production and against
//! scripted in-memory fetchers in tests.
//!
//! Retrying is not the fetcher's job. [`fetch_with_retry`] wraps any fetcher
//! with the fixed attempt cap used for patch downloads.

mod http;
mod retry;

pub use http::{HttpFetcher, DEFAULT_TIMEOUT_SECS};
pub use retry::{
    fetch_with_retry, AttemptEvent, RetryExhausted, RetryPolicy, DEFAULT_MAX_ATTEMPTS,
};

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors that can occur while talking to a remote source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be completed (DNS, connection, read error).
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The request timed out.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// Capability to read remote resources.
///
/// Implementations must treat any non-2xx response as a failure of
/// [`fetch`](Fetcher::fetch). [`exists`](Fetcher::exists) reports a non-2xx
/// response as `Ok(false)` and reserves `Err` for transport failures.
pub trait Fetcher {
    /// Fetch the full body behind `uri`.
    fn fetch(&self, uri: &str) -> FetchResult<Bytes>;

    /// Check whether `uri` exists without downloading it.
    fn exists(&self, uri: &str) -> FetchResult<bool>;
}

impl<T: Fetcher + ?Sized> Fetcher for &T {
    fn fetch(&self, uri: &str) -> FetchResult<Bytes> {
        (**self).fetch(uri)
    }

    fn exists(&self, uri: &str) -> FetchResult<bool> {
        (**self).exists(uri)
    }
}

impl<T: Fetcher + ?Sized> Fetcher for Box<T> {
    fn fetch(&self, uri: &str) -> FetchResult<Bytes> {
        (**self).fetch(uri)
    }

    fn exists(&self, uri: &str) -> FetchResult<bool> {
        (**self).exists(uri)
    }
}

impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn fetch(&self, uri: &str) -> FetchResult<Bytes> {
        (**self).fetch(uri)
    }

    fn exists(&self, uri: &str) -> FetchResult<bool> {
        (**self).exists(uri)
    }
}
