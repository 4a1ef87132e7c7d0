//! Parallel unit retrieval over a bounded worker pool.
//!
//! A retrieval fans the units of one batch (page numbers, movie ids, ...)
//! out to spawned tasks, at most [`WorkerPool::size`] in flight, joins them
//! all, and restores unit order before returning. A failed unit yields no
//! result and is reported in [`Retrieval::failed`]; it never aborts the
//! other units.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use cinesync_api::FetchError;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::UnitError;
use crate::retry::{RetryPolicy, fetch_with_retry};

/// Default number of concurrent fetch workers.
pub const DEFAULT_WORKERS: usize = 20;

/// Bounded worker slots shared by every batch of a pipeline run.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Creates a pool of `size` workers (at least 1).
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Maximum concurrent workers.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Workers currently idle.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

/// A unit that produced no result.
#[derive(Debug)]
pub struct FailedUnit<U> {
    /// Position of the unit in the retrieval input.
    pub position: usize,
    /// The unit.
    pub unit: U,
    /// Cause.
    pub error: UnitError,
}

/// Outcome of one retrieval.
#[derive(Debug)]
pub struct Retrieval<U, T> {
    /// Successful units with their results, in input order.
    pub fetched: Vec<(U, T)>,
    /// Failed units, in input order.
    pub failed: Vec<FailedUnit<U>>,
    /// Whether cancellation stopped the retrieval before every unit ran.
    pub cancelled: bool,
}

impl<U, T> Retrieval<U, T> {
    /// Results without their units, in input order.
    pub fn into_results(self) -> impl Iterator<Item = T> {
        self.fetched.into_iter().map(|(_, value)| value)
    }
}

/// What a worker reports for its unit.
enum Completion<T> {
    Fetched(T),
    Failed(FetchError),
    Interrupted,
}

/// Fetches every unit on the pool and returns the results in unit order.
///
/// Retryable failures are retried per `retry` inside the worker. Once
/// `cancel` fires no further unit is started, in-flight workers are
/// aborted, and the result is marked cancelled.
pub async fn retrieve<U, T, F, Fut>(
    pool: &WorkerPool,
    units: Vec<U>,
    retry: RetryPolicy,
    cancel: &CancellationToken,
    fetch: &Arc<F>,
) -> Retrieval<U, T>
where
    U: Clone + Debug + Send + 'static,
    T: Send + 'static,
    F: Fn(U) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    let mut tasks: JoinSet<(usize, Completion<T>)> = JoinSet::new();
    let mut spawned: HashMap<tokio::task::Id, (usize, U)> = HashMap::with_capacity(units.len());
    let mut cancelled = false;

    for (position, unit) in units.into_iter().enumerate() {
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            permit = Arc::clone(&pool.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    cancelled = true;
                    break;
                }
            },
        };

        let fetch = Arc::clone(fetch);
        let cancel_task = cancel.clone();
        let task_unit = unit.clone();
        let handle = tasks.spawn(async move {
            let result =
                fetch_with_retry(retry, &cancel_task, move || (*fetch)(task_unit.clone())).await;
            drop(permit);
            let completion = match result {
                Ok(value) => Completion::Fetched(value),
                Err(err) if err.is_interrupted() => Completion::Interrupted,
                Err(err) => Completion::Failed(err),
            };
            (position, completion)
        });
        spawned.insert(handle.id(), (position, unit));
    }

    if cancelled {
        tasks.abort_all();
    }

    let mut fetched: Vec<(usize, U, T)> = Vec::with_capacity(spawned.len());
    let mut failed: Vec<FailedUnit<U>> = Vec::new();

    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, (position, completion))) => {
                let Some((_, unit)) = spawned.remove(&id) else {
                    continue;
                };
                match completion {
                    Completion::Fetched(value) => fetched.push((position, unit, value)),
                    Completion::Failed(err) => {
                        tracing::warn!(?unit, error = %err, "unit skipped after fetch failure");
                        failed.push(FailedUnit {
                            position,
                            unit,
                            error: UnitError::Fetch(err),
                        });
                    }
                    Completion::Interrupted => cancelled = true,
                }
            }
            Err(join_err) => {
                let Some((position, unit)) = spawned.remove(&join_err.id()) else {
                    continue;
                };
                if join_err.is_cancelled() {
                    continue;
                }
                tracing::error!(?unit, error = %join_err, "fetch worker failed");
                failed.push(FailedUnit {
                    position,
                    unit,
                    error: UnitError::Worker(join_err.to_string()),
                });
            }
        }
    }

    // Completion order is arbitrary; unit order is the contract.
    fetched.sort_unstable_by_key(|(position, _, _)| *position);
    failed.sort_unstable_by_key(|f| f.position);

    Retrieval {
        fetched: fetched
            .into_iter()
            .map(|(_, unit, value)| (unit, value))
            .collect(),
        failed,
        cancelled,
    }
}
