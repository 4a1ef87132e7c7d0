//! Typed persistence errors.

/// A relationship row whose endpoint has no stored row.
///
/// Reported alongside the batch outcome; the row is skipped, the batch is not.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{relation}: {entity} {external_id} has no stored row")]
pub struct DependencyNotResolved {
    /// Relationship being materialized (`movie_genres`, `cast_credits`, ...).
    pub relation: &'static str,
    /// Kind of the missing endpoint (`movie`, `genre`, ...).
    pub entity: &'static str,
    /// External id of the missing endpoint.
    pub external_id: String,
}

impl DependencyNotResolved {
    /// Creates the error and logs it as a data-integrity warning.
    pub(crate) fn report(
        relation: &'static str,
        entity: &'static str,
        external_id: impl ToString,
    ) -> Self {
        let err = Self {
            relation,
            entity,
            external_id: external_id.to_string(),
        };
        tracing::warn!(
            relation,
            entity,
            external_id = %err.external_id,
            "skipping row with unresolved dependency"
        );
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_relation_and_endpoint() {
        // Arrange
        let err = DependencyNotResolved::report("movie_genres", "genre", 99);

        // Act
        let message = err.to_string();

        // Assert
        assert_eq!(message, "movie_genres: genre 99 has no stored row");
    }
}
