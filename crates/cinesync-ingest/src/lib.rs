//! Batch ingestion pipeline for cinesync.
//!
//! Pulls catalog data from TMDB and KOFIC through the rate-limited clients
//! of `cinesync-api` and stores it with the idempotent persisters of
//! `cinesync-db`. A run is a list of [`Stage`]s; each stage slices its work
//! into batches ([`BatchCoordinator`]), fetches a batch on a bounded worker
//! pool ([`retrieve`]), normalizes the payloads ([`transform`]) and upserts
//! the result. Per-unit failures are skipped and counted; a failed batch
//! ends its stage and the run moves on to the next stage.

/// Batch slicing and pacing.
pub mod coordinator;
mod error;
/// KOFIC box office and mapping stages.
pub mod kofic_job;
/// Title matching policy.
pub mod matching;
/// Stages and run reports.
pub mod orchestrator;
/// Bounded parallel retrieval.
pub mod retriever;
/// Caller-side retry.
pub mod retry;
#[cfg(test)]
mod testing;
/// TMDB catalog stages.
pub mod tmdb_job;
/// Payload normalization.
pub mod transform;

pub use coordinator::{BatchCoordinator, BatchOutcome, BatchPlan, BatchSettings, BatchWork};
pub use error::{StageError, UnitError};
pub use kofic_job::{KoficJob, KoficOptions, default_target_date};
pub use matching::titles_match;
pub use orchestrator::{
    IngestContext, RunReport, Stage, StageReport, StageStatus, StageTally, UnknownStage,
    select_stages,
};
pub use retriever::{FailedUnit, Retrieval, WorkerPool, retrieve};
pub use retry::{RetryPolicy, fetch_with_retry};
pub use tmdb_job::{TmdbJob, TmdbOptions};
