//! Retry wrapper for transient storage failures.
//!
//! [`RetryingStore`] wraps any [`ContentStore`] and retries operations whose
//! error carries a retryable [`ErrorStatus`](crate::ErrorStatus), sleeping with
//! exponential backoff between attempts. Once the attempt budget is spent the
//! last failure is surfaced wrapped in an [`StorageErrorKind::Unavailable`]
//! error.
//!
//! Calls block the current thread while backing off, so async callers should
//! run them on a blocking pool.

use std::time::Duration;

use crate::event::{StorageEventReceiver, WatchHandle};
use crate::storage::{ContentStore, ErrorStatus, StorageError, StorageErrorKind};

/// Retry budget and backoff schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Delay before the second attempt. Doubled for every further attempt.
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// [`ContentStore`] decorator that retries transient failures.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ContentStore> RetryingStore<S> {
    /// Wrap `inner` with the given retry policy.
    #[must_use]
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Access the wrapped store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn with_retry<T>(
        &self,
        operation: &'static str,
        mut f: impl FnMut() -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err) if !err.status.is_retryable() => return Err(err),
                Err(err) if attempt >= max_attempts => {
                    tracing::warn!(
                        operation,
                        attempts = attempt,
                        error = %err,
                        "Storage retry budget exhausted"
                    );
                    return Err(exhausted(err));
                }
                Err(err) => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::debug!(
                        operation,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Transient storage failure, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

/// Wrap the final transient failure in an `Unavailable` error.
fn exhausted(last: StorageError) -> StorageError {
    let mut err =
        StorageError::new(StorageErrorKind::Unavailable).with_status(ErrorStatus::Persistent);
    if let Some(backend) = last.backend {
        err = err.with_backend(backend);
    }
    if let Some(path) = last.path.clone() {
        err = err.with_path(path);
    }
    err.with_source(last)
}

impl<S: ContentStore> ContentStore for RetryingStore<S> {
    fn read(&self, location: &str, slug: &str) -> Result<String, StorageError> {
        self.with_retry("read", || self.inner.read(location, slug))
    }

    fn list_slugs(&self, location: &str) -> Result<Vec<String>, StorageError> {
        self.with_retry("list_slugs", || self.inner.list_slugs(location))
    }

    fn read_meta(&self, location: &str, dir: &str) -> Result<Option<String>, StorageError> {
        self.with_retry("read_meta", || self.inner.read_meta(location, dir))
    }

    fn watch(
        &self,
        locations: &[String],
    ) -> Result<(StorageEventReceiver, WatchHandle), StorageError> {
        self.inner.watch(locations)
    }
}
