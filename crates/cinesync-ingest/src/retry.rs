//! Caller-side retry of single fetches.

use std::future::Future;
use std::time::Duration;

use cinesync_api::FetchError;
use tokio_util::sync::CancellationToken;

/// How often and how patiently a failed fetch is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

/// Runs `fetch` until it succeeds, fails with a non-retryable error, or
/// the retry budget is spent.
///
/// The backoff sleep is cancel-aware. A retryable failure that meets a
/// cancellation comes back as [`FetchError::Interrupted`], never as the
/// provider error.
pub async fn fetch_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut fetch: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt: u32 = 0;
    loop {
        let err = match fetch().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= policy.max_retries {
            return Err(err);
        }
        if cancel.is_cancelled() {
            return Err(err.into_interrupted());
        }

        attempt = attempt.saturating_add(1);
        let delay = policy.delay_for(attempt);
        tracing::warn!(
            resource = %err.resource(),
            attempt,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis(),
            error = %err,
            "retrying fetch"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(err.into_interrupted()),
            () = tokio::time::sleep(delay) => {}
        }
    }
}
