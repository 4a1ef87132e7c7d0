//! Stage and unit errors.

use cinesync_api::FetchError;

/// Failure that ends a stage.
///
/// Per-unit and per-item failures never reach this type; they are counted
/// as skipped by the batch that absorbed them.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// A store operation failed; the current batch is aborted.
    #[error("persistence failed: {0:#}")]
    Persistence(anyhow::Error),

    /// The run was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// A fetch the stage cannot proceed without failed.
    #[error(transparent)]
    Fetch(FetchError),
}

impl From<anyhow::Error> for StageError {
    fn from(err: anyhow::Error) -> Self {
        Self::Persistence(err)
    }
}

impl From<FetchError> for StageError {
    fn from(err: FetchError) -> Self {
        if err.is_interrupted() {
            Self::Cancelled
        } else {
            Self::Fetch(err)
        }
    }
}

/// Why one unit of a retrieval produced no result.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    /// The fetch failed (after retries when retryable).
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The worker task panicked or was aborted.
    #[error("worker task failed: {0}")]
    Worker(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_renders_context_chain() {
        // Arrange
        let err = anyhow::anyhow!("disk full").context("failed to commit movies upsert");

        // Act
        let stage_err = StageError::from(err);

        // Assert
        assert_eq!(
            stage_err.to_string(),
            "persistence failed: failed to commit movies upsert: disk full"
        );
    }

    #[test]
    fn test_interrupted_fetch_is_cancellation() {
        // Arrange
        let err = FetchError::Interrupted {
            resource: cinesync_api::ResourceKind::MovieGenres,
            params: String::from("genre/movie/list"),
        };

        // Act
        let stage_err = StageError::from(err);

        // Assert
        assert!(matches!(stage_err, StageError::Cancelled));
    }
}
