//! Referential-integrity scan over every child reference.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// `(child table, column, parent table)` of every reference.
const REFERENCES: &[(&str, &str, &str)] = &[
    ("movie_genres", "movie_id", "movies"),
    ("movie_genres", "genre_id", "genres"),
    ("movie_platforms", "movie_id", "movies"),
    ("movie_platforms", "platform_id", "platforms"),
    ("movie_companies", "movie_id", "movies"),
    ("movie_companies", "company_id", "companies"),
    ("cast_credits", "movie_id", "movies"),
    ("cast_credits", "person_id", "people"),
    ("crew_credits", "movie_id", "movies"),
    ("crew_credits", "person_id", "people"),
    ("images", "movie_id", "movies"),
    ("videos", "movie_id", "movies"),
    ("kofic_movies", "movie_id", "movies"),
    ("box_office", "kofic_movie_id", "kofic_movies"),
];

/// Rows of one child table pointing at a missing parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanCount {
    /// Child table.
    pub table: &'static str,
    /// Referencing column.
    pub column: &'static str,
    /// Parent table.
    pub parent: &'static str,
    /// Number of orphaned rows.
    pub count: u64,
}

/// Result of [`check_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// References with at least one orphan.
    pub orphans: Vec<OrphanCount>,
}

impl IntegrityReport {
    /// Whether every reference points at an existing row.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty()
    }
}

/// Counts child rows whose referenced parent does not exist.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn check_integrity(conn: &Connection) -> Result<IntegrityReport> {
    let mut report = IntegrityReport::default();
    for &(table, column, parent) in REFERENCES {
        let sql = format!(
            "SELECT COUNT(*) FROM {table} c
             LEFT JOIN {parent} p ON p.id = c.{column}
             WHERE c.{column} IS NOT NULL AND p.id IS NULL"
        );
        let count: u64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .with_context(|| format!("failed to scan {table}.{column}"))?;
        if count > 0 {
            tracing::warn!(table, column, parent, count, "orphaned rows found");
            report.orphans.push(OrphanCount {
                table,
                column,
                parent,
                count,
            });
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use crate::connection::open_memory_db;
    use crate::movies::persist_movies;
    use crate::movies::tests::movie;

    #[test]
    fn test_clean_store() {
        // Arrange
        let conn = open_memory_db().unwrap();
        persist_movies(&conn, &[movie(1, "a")]).unwrap();

        // Act
        let report = check_integrity(&conn).unwrap();

        // Assert
        assert!(report.is_clean());
    }

    #[test]
    fn test_detects_orphaned_link() {
        // Arrange: bypass the foreign key to plant an orphan
        let conn = open_memory_db().unwrap();
        conn.pragma_update(None, "foreign_keys", false).unwrap();
        conn.execute(
            "INSERT INTO movie_genres (movie_id, genre_id) VALUES (42, 7)",
            [],
        )
        .unwrap();

        // Act
        let report = check_integrity(&conn).unwrap();

        // Assert
        assert!(!report.is_clean());
        assert_eq!(report.orphans.len(), 2);
        assert_eq!(report.orphans[0].table, "movie_genres");
        assert_eq!(report.orphans[0].column, "movie_id");
        assert_eq!(report.orphans[0].count, 1);
    }
}
