//! Bounded retry with linear backoff.
//!
//! The delay before retry `k` (1-indexed) is `base_delay * k`. Cancellation
//! short-circuits both a running attempt and a pending backoff sleep.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use lumio_core::{UploadConfig, UploadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.max_attempts, config.retry_base_delay())
    }

    /// Linear backoff before retry `retry` (1-indexed).
    #[inline]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(retry)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// is cancelled, or `max_attempts` attempts have been made.
    ///
    /// `operation` receives the 1-indexed attempt number. Exhaustion is
    /// reported as [`UploadError::RetriesExhausted`] wrapping the last cause.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, UploadError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, UploadError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(UploadError::Canceled);
            }

            attempt += 1;

            let err = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.is_cancelled() || cancel.is_cancelled() {
                return Err(UploadError::Canceled);
            }

            if !err.is_retryable() {
                tracing::debug!(
                    attempt,
                    error = %err,
                    "Upload attempt failed with non-retryable error"
                );
                return Err(err);
            }

            if attempt >= max_attempts {
                return Err(UploadError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = self.delay_for(attempt);
            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Upload attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Canceled),
                _ = sleep(delay) => {}
            }
        }
    }
}
