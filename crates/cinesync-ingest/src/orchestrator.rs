//! Ordered pipeline stages and the per-stage run report.

use std::fmt;
use std::time::Duration;

use cinesync_db::{PersistOutcome, UpsertSummary};
use rusqlite::Connection;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::coordinator::{BatchSettings, BatchWork};
use crate::error::StageError;
use crate::retriever::WorkerPool;

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Movie and TV genres.
    Genres,
    /// Streaming platforms of the region.
    Platforms,
    /// Movie listings.
    Movies,
    /// Per-movie platform availability.
    Availability,
    /// Per-movie images.
    Images,
    /// Per-movie videos.
    Videos,
    /// Per-movie cast and crew.
    Credits,
    /// Per-movie runtime, status and production companies.
    Details,
    /// KOFIC daily box office.
    BoxOffice,
    /// KOFIC movies to catalog movies.
    KoficMapping,
}

impl Stage {
    /// TMDB stages in dependency order.
    pub const TMDB: [Self; 8] = [
        Self::Genres,
        Self::Platforms,
        Self::Movies,
        Self::Availability,
        Self::Images,
        Self::Videos,
        Self::Credits,
        Self::Details,
    ];

    /// KOFIC stages in dependency order.
    pub const KOFIC: [Self; 2] = [Self::BoxOffice, Self::KoficMapping];

    /// Stable stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Genres => "genres",
            Self::Platforms => "platforms",
            Self::Movies => "movies",
            Self::Availability => "availability",
            Self::Images => "images",
            Self::Videos => "videos",
            Self::Credits => "credits",
            Self::Details => "details",
            Self::BoxOffice => "box_office",
            Self::KoficMapping => "kofic_mapping",
        }
    }

    /// Looks a stage up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::TMDB
            .into_iter()
            .chain(Self::KOFIC)
            .find(|stage| stage.name() == name)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stage name outside the job's stage list.
#[derive(Debug, thiserror::Error)]
#[error("unknown stage `{name}` (expected one of: {expected})")]
pub struct UnknownStage {
    /// Rejected name.
    pub name: String,
    /// Accepted names, comma separated.
    pub expected: String,
}

/// Picks the stages named in `filter` (comma separated) out of `available`.
///
/// The result keeps the order of `available` whatever the order of the
/// filter. `None` selects every stage.
///
/// # Errors
///
/// Returns [`UnknownStage`] for a name not in `available`.
pub fn select_stages(available: &[Stage], filter: Option<&str>) -> Result<Vec<Stage>, UnknownStage> {
    let Some(filter) = filter else {
        return Ok(available.to_vec());
    };

    let mut wanted = Vec::new();
    for name in filter.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match Stage::from_name(name).filter(|stage| available.contains(stage)) {
            Some(stage) => wanted.push(stage),
            None => {
                let expected: Vec<&str> = available.iter().map(|s| s.name()).collect();
                return Err(UnknownStage {
                    name: String::from(name),
                    expected: expected.join(", "),
                });
            }
        }
    }

    Ok(available
        .iter()
        .copied()
        .filter(|stage| wanted.contains(stage))
        .collect())
}

/// Counters accumulated while a stage runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTally {
    /// Batches persisted.
    pub batches: usize,
    /// Units or items fetched.
    pub fetched: usize,
    /// Rows inserted.
    pub inserted: usize,
    /// Rows matched by external ID.
    pub updated: usize,
    /// Matched rows left untouched.
    pub unchanged: usize,
    /// Relationship rows written.
    pub linked: usize,
    /// Units skipped after a failure.
    pub skipped: usize,
    /// Relationship rows skipped for a missing endpoint.
    pub unresolved: usize,
}

impl StageTally {
    /// Adds an upsert summary.
    pub const fn record_summary(&mut self, summary: &UpsertSummary) {
        self.inserted = self.inserted.saturating_add(summary.inserted);
        self.updated = self.updated.saturating_add(summary.updated);
        self.unchanged = self.unchanged.saturating_add(summary.unchanged);
    }

    /// Adds a persist outcome.
    pub fn record_persisted(&mut self, outcome: &PersistOutcome) {
        self.record_summary(&outcome.summary);
        self.linked = self.linked.saturating_add(outcome.linked);
        self.unresolved = self.unresolved.saturating_add(outcome.unresolved.len());
    }

    /// Adds one processed batch.
    pub fn record_batch(&mut self, work: &BatchWork) {
        self.batches = self.batches.saturating_add(1);
        self.fetched = self.fetched.saturating_add(work.fetched);
        self.skipped = self.skipped.saturating_add(work.skipped);
        self.record_persisted(&work.persisted);
    }
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    /// Every unit succeeded.
    Completed,
    /// Finished, with this many units skipped.
    CompletedWithSkips(usize),
    /// Aborted by a batch-level failure.
    Failed(String),
    /// Stopped by cancellation.
    Cancelled,
}

impl StageStatus {
    /// Whether the stage failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::CompletedWithSkips(1) => f.write_str("completed with 1 skipped item"),
            Self::CompletedWithSkips(n) => write!(f, "completed with {n} skipped items"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Result of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    /// Stage.
    pub stage: Stage,
    /// Final status.
    pub status: StageStatus,
    /// Counters at the end of the stage.
    pub tally: StageTally,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

impl StageReport {
    /// Builds the report of a stage from its counters and result.
    #[must_use]
    pub fn finish(
        stage: Stage,
        tally: StageTally,
        result: Result<(), StageError>,
        elapsed: Duration,
    ) -> Self {
        let status = match result {
            Ok(()) if tally.skipped == 0 => StageStatus::Completed,
            Ok(()) => StageStatus::CompletedWithSkips(tally.skipped),
            Err(StageError::Cancelled) => StageStatus::Cancelled,
            Err(err) => StageStatus::Failed(err.to_string()),
        };
        Self {
            stage,
            status,
            tally,
            elapsed,
        }
    }

    /// Reports a stage that never started.
    #[must_use]
    pub fn cancelled(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::Cancelled,
            tally: StageTally::default(),
            elapsed: Duration::ZERO,
        }
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Per-stage reports in run order.
    pub stages: Vec<StageReport>,
}

impl RunReport {
    /// Whether any stage failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.stages.iter().any(|report| report.status.is_failure())
    }

    /// Whether the run was cut short by cancellation.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.stages
            .iter()
            .any(|report| report.status == StageStatus::Cancelled)
    }

    /// Report of `stage`, when it ran.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.stage == stage)
    }

    /// Logs one summary line per stage.
    pub fn log_summary(&self) {
        for report in &self.stages {
            let t = &report.tally;
            tracing::info!(
                stage = %report.stage,
                status = %report.status,
                batches = t.batches,
                fetched = t.fetched,
                inserted = t.inserted,
                updated = t.updated,
                unchanged = t.unchanged,
                linked = t.linked,
                skipped = t.skipped,
                unresolved = t.unresolved,
                elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
                "stage summary"
            );
        }
    }
}

/// Store, worker pool, batching and cancellation shared by every stage.
#[derive(Debug, Clone, Copy)]
pub struct IngestContext<'a> {
    /// Catalog store.
    pub conn: &'a Connection,
    /// Pipeline-scoped worker pool.
    pub pool: &'a WorkerPool,
    /// Batch settings.
    pub batch: &'a BatchSettings,
    /// Stops the run between tasks.
    pub cancel: &'a CancellationToken,
}

/// Something that can run the stages of a job.
pub(crate) trait StageRunner {
    /// Runs one stage, accumulating into `tally`.
    async fn run_stage(&self, stage: Stage, tally: &mut StageTally) -> Result<(), StageError>;
}

/// Runs `stages` in order.
///
/// A failed stage is logged and the next stage still runs. Once `cancel`
/// fires, the remaining stages are reported as cancelled without starting.
pub(crate) async fn run_stages<R: StageRunner>(
    runner: &R,
    stages: &[Stage],
    cancel: &CancellationToken,
) -> RunReport {
    let mut report = RunReport::default();

    for &stage in stages {
        if cancel.is_cancelled() {
            report.stages.push(StageReport::cancelled(stage));
            continue;
        }

        tracing::info!(%stage, "stage started");
        let started = Instant::now();
        let mut tally = StageTally::default();
        let result = runner.run_stage(stage, &mut tally).await;
        let stage_report = StageReport::finish(stage, tally, result, started.elapsed());

        if stage_report.status.is_failure() {
            tracing::error!(%stage, status = %stage_report.status, "stage failed, continuing with the next stage");
        } else {
            tracing::info!(%stage, status = %stage_report.status, "stage finished");
        }
        report.stages.push(stage_report);
    }

    report
}
