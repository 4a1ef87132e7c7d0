//! Fixed-window rate limiter shared by every request sent to one provider.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default number of calls per window (TMDB allows ~40 per 10 seconds).
pub const DEFAULT_CAPACITY: usize = 40;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Default bounded wait before falling back to waiting for the next window.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(1);

/// Reason an `acquire` call returned without a slot.
#[derive(Debug, Error, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub enum AcquireError {
    /// The caller's cancellation token fired while waiting.
    #[error("rate limiter wait cancelled")]
    Cancelled,
    /// The underlying semaphore was closed.
    #[error("rate limiter closed")]
    Closed,
}

/// Grants at most `capacity` call slots per fixed window.
///
/// Slots are semaphore permits that are consumed (never returned) by a
/// call. The first caller to observe an expired window rolls it over under
/// the window lock and tops the semaphore back up to `capacity`; every other
/// caller sees the fresh window start and skips the reset.
///
/// An optional minimum spacing between consecutive grants smooths bursts
/// inside a window.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct RateLimiter {
    /// Provider label for logs and metrics.
    name: &'static str,
    /// Slots per window.
    capacity: usize,
    /// Window length.
    window: Duration,
    /// Bounded wait for a slot before waiting on window rollover.
    acquire_timeout: Duration,
    /// Minimum gap between two grants.
    min_spacing: Duration,
    /// Remaining slots in the current window.
    permits: Semaphore,
    /// Start of the current window; the lock guards the reset path.
    window_start: Mutex<Instant>,
    /// Slots granted in the current window.
    calls_in_window: AtomicUsize,
    /// Slots granted since construction.
    total_calls: AtomicU64,
    /// Time of the most recent grant (only tracked when spacing is set).
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter granting `capacity` calls per `window`.
    ///
    /// A zero capacity is raised to one so callers can always make progress.
    #[must_use]
    pub fn new(name: &'static str, capacity: usize, window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            capacity,
            window,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            min_spacing: Duration::ZERO,
            permits: Semaphore::new(capacity),
            window_start: Mutex::new(Instant::now()),
            calls_in_window: AtomicUsize::new(0),
            total_calls: AtomicU64::new(0),
            last_grant: Mutex::new(None),
        }
    }

    /// Creates a limiter with the default TMDB ceiling (40 calls / 10 s).
    #[must_use]
    pub fn tmdb_default() -> Self {
        Self::new("tmdb", DEFAULT_CAPACITY, DEFAULT_WINDOW)
    }

    /// Sets the bounded wait used before falling back to an unbounded wait.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets the minimum spacing between consecutive grants.
    #[must_use]
    pub const fn with_min_spacing(mut self, spacing: Duration) -> Self {
        self.min_spacing = spacing;
        self
    }

    /// Provider label.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Slots per window.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots granted since construction.
    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    /// Slots granted in the current window.
    #[must_use]
    pub fn calls_in_window(&self) -> usize {
        self.calls_in_window.load(Ordering::Relaxed)
    }

    /// Waits until a call slot is available and takes it.
    ///
    /// The first attempt waits at most `acquire_timeout`; after that the
    /// caller keeps waiting across window rollovers until a slot frees up.
    /// The call is never dropped, only cancelled.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::Cancelled`] if `cancel` fires while waiting.
    /// - [`AcquireError::Closed`] if the semaphore was closed.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), AcquireError> {
        let mut bounded = true;
        loop {
            let remaining = self.roll_window().await;
            let wait = if bounded {
                remaining.min(self.acquire_timeout)
            } else {
                remaining
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::warn!(limiter = self.name, "rate limiter wait cancelled");
                    return Err(AcquireError::Cancelled);
                }
                acquired = tokio::time::timeout(wait, self.permits.acquire()) => match acquired {
                    Ok(Ok(permit)) => {
                        permit.forget();
                        break;
                    }
                    Ok(Err(_)) => return Err(AcquireError::Closed),
                    Err(_) => {
                        if bounded {
                            tracing::debug!(
                                limiter = self.name,
                                capacity = self.capacity,
                                "no rate-limit slot within bounded wait, waiting for window rollover"
                            );
                            bounded = false;
                        }
                    }
                },
            }
        }

        self.space_out(cancel).await?;

        self.calls_in_window.fetch_add(1, Ordering::Relaxed);
        let calls = self
            .total_calls
            .fetch_add(1, Ordering::Relaxed)
            .saturating_add(1);
        tracing::trace!(limiter = self.name, calls, "rate-limit slot granted");

        #[cfg(feature = "otel")]
        record_call(self.name);

        Ok(())
    }

    /// Rolls the window over if it has expired and returns the time left in
    /// the current window.
    async fn roll_window(&self) -> Duration {
        let mut start = self.window_start.lock().await;
        let elapsed = start.elapsed();
        if elapsed < self.window {
            return self.window.saturating_sub(elapsed);
        }

        *start = Instant::now();
        let calls = self.calls_in_window.swap(0, Ordering::AcqRel);
        let restored = self
            .capacity
            .saturating_sub(self.permits.available_permits());
        self.permits.add_permits(restored);
        tracing::debug!(
            limiter = self.name,
            calls,
            restored,
            "rate-limit window rolled over"
        );
        self.window
    }

    /// Enforces `min_spacing` between consecutive grants.
    async fn space_out(&self, cancel: &CancellationToken) -> Result<(), AcquireError> {
        if self.min_spacing.is_zero() {
            return Ok(());
        }

        let mut last = self.last_grant.lock().await;
        if let Some(ready_at) = last.and_then(|prev| prev.checked_add(self.min_spacing)) {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::warn!(limiter = self.name, "rate limiter spacing wait cancelled");
                    return Err(AcquireError::Cancelled);
                }
                () = tokio::time::sleep_until(ready_at) => {}
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }
}

/// Exports the granted call as an OpenTelemetry counter increment.
#[cfg(feature = "otel")]
fn record_call(limiter: &'static str) {
    use std::sync::OnceLock;

    use opentelemetry::KeyValue;
    use opentelemetry::metrics::Counter;

    static CALLS: OnceLock<Counter<u64>> = OnceLock::new();
    CALLS
        .get_or_init(|| {
            opentelemetry::global::meter("cinesync-api")
                .u64_counter("cinesync.api.calls")
                .with_description("Upstream API calls granted by the rate limiter")
                .build()
        })
        .add(1, &[KeyValue::new("provider", limiter)]);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::BTreeMap;
    use std::sync::Arc;

    use tokio::task::JoinSet;

    use super::*;

    /// Issues `calls` concurrent acquires and returns each grant's offset
    /// from the start.
    async fn grant_offsets(limiter: Arc<RateLimiter>, calls: usize) -> Vec<Duration> {
        let origin = Instant::now();
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        for _ in 0..calls {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                limiter.acquire(&cancel).await.unwrap();
                origin.elapsed()
            });
        }

        let mut offsets = Vec::with_capacity(calls);
        while let Some(joined) = tasks.join_next().await {
            offsets.push(joined.unwrap());
        }
        offsets.sort();
        offsets
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_window_grants_more_than_capacity() {
        for (capacity, calls) in [(1_usize, 4_usize), (3, 10), (5, 5), (4, 13)] {
            // Arrange
            let window = Duration::from_secs(1);
            let limiter = Arc::new(RateLimiter::new("test", capacity, window));

            // Act
            let offsets = grant_offsets(Arc::clone(&limiter), calls).await;

            // Assert
            let mut per_window: BTreeMap<u128, usize> = BTreeMap::new();
            for offset in &offsets {
                let slot = per_window.entry(offset.as_millis() / 1000).or_default();
                *slot = slot.saturating_add(1);
            }
            assert_eq!(offsets.len(), calls);
            assert!(
                per_window.values().all(|&n| n <= capacity),
                "capacity {capacity} exceeded: {per_window:?}"
            );
            assert_eq!(limiter.total_calls(), u64::try_from(calls).unwrap());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_excess_calls_wait_for_next_window() {
        // Arrange
        let limiter = Arc::new(RateLimiter::new("test", 2, Duration::from_secs(10)));

        // Act
        let offsets = grant_offsets(limiter, 3).await;

        // Assert
        assert!(offsets[1] < Duration::from_secs(1));
        assert!(offsets[2] >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_timeout_falls_back_instead_of_dropping() {
        // Arrange
        let limiter = RateLimiter::new("test", 1, Duration::from_secs(5))
            .with_acquire_timeout(Duration::from_millis(200));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        // Act
        let start = Instant::now();
        let result = limiter.acquire(&cancel).await;

        // Assert
        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(limiter.total_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait() {
        // Arrange
        let limiter = RateLimiter::new("test", 1, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        // Act
        let result = limiter.acquire(&cancel).await;

        // Assert
        assert_eq!(result, Err(AcquireError::Cancelled));
        assert_eq!(limiter.total_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollover_resets_window_counter() {
        // Arrange
        let limiter = RateLimiter::new("test", 5, Duration::from_secs(1));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();
        limiter.acquire(&cancel).await.unwrap();
        assert_eq!(limiter.calls_in_window(), 2);

        // Act
        tokio::time::sleep(Duration::from_secs(1)).await;
        limiter.acquire(&cancel).await.unwrap();

        // Assert
        assert_eq!(limiter.calls_in_window(), 1);
        assert_eq!(limiter.total_calls(), 3);
        assert_eq!(limiter.permits.available_permits(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_spacing_between_grants() {
        // Arrange
        let limiter = RateLimiter::new("test", 10, Duration::from_secs(10))
            .with_min_spacing(Duration::from_millis(100));
        let cancel = CancellationToken::new();

        // Act
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire(&cancel).await.unwrap();
        }

        // Assert
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        // Arrange & Act
        let limiter = RateLimiter::new("test", 0, Duration::from_secs(1));

        // Assert
        assert_eq!(limiter.capacity(), 1);
    }

    #[test]
    fn test_tmdb_default() {
        // Arrange & Act
        let limiter = RateLimiter::tmdb_default();

        // Assert
        assert_eq!(limiter.capacity(), DEFAULT_CAPACITY);
        assert_eq!(limiter.name(), "tmdb");
    }
}
