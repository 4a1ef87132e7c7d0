//! Batch coordination over a large unit-of-work.

use std::future::Future;
use std::ops::Range;
use std::time::Duration;

use cinesync_db::PersistOutcome;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::StageError;
use crate::orchestrator::Stage;
use crate::retry::RetryPolicy;

/// Default units per batch.
pub const DEFAULT_BATCH_SIZE: usize = 39;

/// Default pause between consecutive batches.
pub const DEFAULT_INTER_BATCH_DELAY: Duration = Duration::from_secs(10);

/// Batch sizing, pacing and retry settings of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Units per batch (at least 1).
    pub size: usize,
    /// Pause before every batch but the first.
    pub inter_batch_delay: Duration,
    /// Retry policy of single unit fetches.
    pub retry: RetryPolicy,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            size: DEFAULT_BATCH_SIZE,
            inter_batch_delay: DEFAULT_INTER_BATCH_DELAY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Split of `total_units` into fixed-size batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    total_units: usize,
    size: usize,
}

impl BatchPlan {
    /// Plans `total_units` in batches of `size` (at least 1).
    #[must_use]
    pub fn new(total_units: usize, size: usize) -> Self {
        Self {
            total_units,
            size: size.max(1),
        }
    }

    /// Number of batches (`ceil(total_units / size)`).
    #[must_use]
    pub const fn total_batches(&self) -> usize {
        self.total_units.div_ceil(self.size)
    }

    /// Unit range of batch `index`; empty past the end.
    #[must_use]
    pub fn range(&self, index: usize) -> Range<usize> {
        let start = index.saturating_mul(self.size).min(self.total_units);
        let end = start.saturating_add(self.size).min(self.total_units);
        start..end
    }
}

/// What processing one batch produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWork {
    /// Units fetched successfully.
    pub fetched: usize,
    /// Units that failed and were skipped.
    pub skipped: usize,
    /// Persistence result of the batch.
    pub persisted: PersistOutcome,
}

impl BatchWork {
    /// Whether the batch yielded no usable result.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fetched == 0
    }
}

/// One persisted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Zero-based batch index.
    pub index: usize,
    /// Unit range covered.
    pub units: Range<usize>,
    /// What the batch produced.
    pub work: BatchWork,
}

/// Drives a per-batch processor over a planned unit-of-work.
#[derive(Debug)]
pub struct BatchCoordinator<'a> {
    stage: Stage,
    settings: &'a BatchSettings,
    cancel: &'a CancellationToken,
}

/// Loop state threaded through the outcome stream.
struct Cursor<F> {
    process: F,
    index: usize,
    done: bool,
}

impl<'a> BatchCoordinator<'a> {
    /// Creates a coordinator for `stage`.
    #[must_use]
    pub const fn new(
        stage: Stage,
        settings: &'a BatchSettings,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            stage,
            settings,
            cancel,
        }
    }

    /// Runs `process` once per batch of `total_units`, lazily.
    ///
    /// Batches run strictly one after another, separated by the
    /// inter-batch delay. An empty batch is logged and skipped. The stream
    /// ends after the last batch, after the first `Err` (a failed batch
    /// aborts the stage), or once cancelled.
    pub fn run<F, Fut>(
        &self,
        total_units: usize,
        process: F,
    ) -> impl Stream<Item = Result<BatchOutcome, StageError>> + 'a
    where
        F: FnMut(Range<usize>) -> Fut + 'a,
        Fut: Future<Output = Result<BatchWork, StageError>> + 'a,
    {
        let plan = BatchPlan::new(total_units, self.settings.size);
        let total_batches = plan.total_batches();
        let delay = self.settings.inter_batch_delay;
        let stage = self.stage;
        let cancel = self.cancel;

        tracing::info!(
            %stage,
            total_units,
            batch_size = self.settings.size,
            total_batches,
            "planned batches"
        );

        let cursor = Cursor {
            process,
            index: 0,
            done: false,
        };

        futures::stream::unfold(cursor, move |mut cursor| async move {
            if cursor.done || cursor.index >= total_batches {
                return None;
            }

            if cursor.index > 0 && !delay.is_zero() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                cursor.done = true;
                return Some((Err(StageError::Cancelled), cursor));
            }

            let index = cursor.index;
            let units = plan.range(index);
            let batch = index.saturating_add(1);
            cursor.index = batch;

            match (cursor.process)(units.clone()).await {
                Ok(work) => {
                    if work.is_empty() {
                        tracing::info!(
                            %stage, batch, total_batches, ?units,
                            skipped = work.skipped,
                            "batch yielded nothing, moving on"
                        );
                    } else {
                        tracing::info!(
                            %stage, batch, total_batches, ?units,
                            fetched = work.fetched,
                            skipped = work.skipped,
                            inserted = work.persisted.summary.inserted,
                            updated = work.persisted.summary.updated,
                            unresolved = work.persisted.unresolved.len(),
                            "batch persisted"
                        );
                    }
                    Some((Ok(BatchOutcome { index, units, work }), cursor))
                }
                Err(err) => {
                    if !matches!(err, StageError::Cancelled) {
                        tracing::error!(%stage, batch, total_batches, ?units, error = %err, "batch aborted");
                    }
                    cursor.done = true;
                    Some((Err(err), cursor))
                }
            }
        })
    }
}
