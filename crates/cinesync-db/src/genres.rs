//! Genre records.

use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

use crate::upsert::{Keyed, Upsert, UpsertSummary, upsert};

/// A movie or TV genre.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreRecord {
    /// TMDB genre ID.
    pub tmdb_id: u32,
    /// Localized name.
    pub name: String,
}

impl Keyed for GenreRecord {
    type Key = u32;
    const ENTITY: &'static str = "genre";
    const TABLE: &'static str = "genres";
    const KEY_COLUMN: &'static str = "tmdb_id";
}

impl Upsert for GenreRecord {
    type Snapshot = String;
    const COLUMNS: &'static [&'static str] = &["tmdb_id", "name"];
    const REFRESHABLE: &'static [&'static str] = &["name"];

    fn key(&self) -> u32 {
        self.tmdb_id
    }

    fn snapshot(&self) -> String {
        self.name.clone()
    }

    fn read_snapshot(row: &Row<'_>) -> rusqlite::Result<String> {
        row.get(2)
    }

    fn insert_values(&self) -> Vec<&dyn ToSql> {
        vec![&self.tmdb_id, &self.name]
    }

    fn refresh_values(&self) -> Vec<&dyn ToSql> {
        vec![&self.name]
    }
}

/// Upserts genres by TMDB ID.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn persist_genres(conn: &Connection, records: &[GenreRecord]) -> Result<UpsertSummary> {
    Ok(upsert(conn, records)?.summary)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::connection::open_memory_db;

    #[test]
    fn test_persist_genres_refreshes_name() {
        // Arrange
        let conn = open_memory_db().unwrap();
        let first = vec![GenreRecord {
            tmdb_id: 28,
            name: String::from("Action"),
        }];
        let second = vec![GenreRecord {
            tmdb_id: 28,
            name: String::from("액션"),
        }];

        // Act
        persist_genres(&conn, &first).unwrap();
        let summary = persist_genres(&conn, &second).unwrap();

        // Assert
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 0);
        let name: String = conn
            .query_row("SELECT name FROM genres WHERE tmdb_id = 28", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "액션");
    }
}
