//! Fixed-cap retry for patch downloads.
//!
//! Attempts are made back to back with no delay. Any error counts as a
//! failed attempt; the first success ends the loop.

use bytes::Bytes;
use thiserror::Error;
use tracing::warn;

use super::{FetchError, Fetcher};

/// Default number of attempts per patch file.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How many times a single fetch may be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` attempts (minimum 1).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Progress notification from [`fetch_with_retry`].
#[derive(Debug, Clone, Copy)]
pub enum AttemptEvent<'a> {
    /// An attempt is about to start (1-based).
    Started { attempt: u32 },

    /// An attempt failed.
    Failed { attempt: u32, error: &'a FetchError },
}

/// Every attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("gave up after {attempts} attempts: {last_error}")]
pub struct RetryExhausted {
    /// Number of attempts made.
    pub attempts: u32,

    /// Error from the final attempt.
    pub last_error: FetchError,
}

/// Fetch `uri`, retrying up to the policy's cap.
///
/// `on_attempt` is told about every attempt start and failure.
pub fn fetch_with_retry<F, A>(
    fetcher: &F,
    uri: &str,
    policy: RetryPolicy,
    mut on_attempt: A,
) -> Result<Bytes, RetryExhausted>
where
    F: Fetcher + ?Sized,
    A: FnMut(AttemptEvent<'_>),
{
    let mut attempt = 1;

    loop {
        on_attempt(AttemptEvent::Started { attempt });

        match fetcher.fetch(uri) {
            Ok(bytes) => return Ok(bytes),
            Err(error) => {
                warn!(
                    uri,
                    attempt,
                    max_attempts = policy.max_attempts(),
                    error = %error,
                    "fetch attempt failed"
                );
                on_attempt(AttemptEvent::Failed {
                    attempt,
                    error: &error,
                });

                if attempt >= policy.max_attempts() {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }
            }
        }

        attempt += 1;
    }
}
