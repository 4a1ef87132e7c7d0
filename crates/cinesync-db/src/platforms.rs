//! Streaming platforms and per-movie availability.

use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

use crate::links::{LinkMode, Relation, link_movies};
use crate::upsert::{Keyed, PersistOutcome, Upsert, UpsertSummary, upsert};

/// A watch provider (Netflix, Watcha, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformRecord {
    /// TMDB provider ID.
    pub tmdb_id: u32,
    /// Provider name.
    pub name: String,
    /// Logo image path.
    pub logo_path: Option<String>,
    /// Display priority.
    pub display_priority: Option<i64>,
}

impl Keyed for PlatformRecord {
    type Key = u32;
    const ENTITY: &'static str = "platform";
    const TABLE: &'static str = "platforms";
    const KEY_COLUMN: &'static str = "tmdb_id";
}

impl Upsert for PlatformRecord {
    type Snapshot = (String, Option<String>, Option<i64>);
    const COLUMNS: &'static [&'static str] = &["tmdb_id", "name", "logo_path", "display_priority"];
    const REFRESHABLE: &'static [&'static str] = &["name", "logo_path", "display_priority"];

    fn key(&self) -> u32 {
        self.tmdb_id
    }

    fn snapshot(&self) -> Self::Snapshot {
        (
            self.name.clone(),
            self.logo_path.clone(),
            self.display_priority,
        )
    }

    fn read_snapshot(row: &Row<'_>) -> rusqlite::Result<Self::Snapshot> {
        Ok((row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn insert_values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.tmdb_id,
            &self.name,
            &self.logo_path,
            &self.display_priority,
        ]
    }

    fn refresh_values(&self) -> Vec<&dyn ToSql> {
        vec![&self.name, &self.logo_path, &self.display_priority]
    }
}

/// Platforms a movie is available on in the configured region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityRecord {
    /// TMDB movie ID.
    pub movie_tmdb_id: u64,
    /// TMDB provider IDs (deduplicated).
    pub platform_ids: Vec<u32>,
}

/// Upserts platforms by TMDB provider ID.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn persist_platforms(conn: &Connection, records: &[PlatformRecord]) -> Result<UpsertSummary> {
    Ok(upsert(conn, records)?.summary)
}

/// Replaces the platform links of each movie.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn persist_availability(
    conn: &Connection,
    records: &[AvailabilityRecord],
) -> Result<PersistOutcome> {
    let groups: Vec<(u64, &[u32])> = records
        .iter()
        .map(|r| (r.movie_tmdb_id, r.platform_ids.as_slice()))
        .collect();
    let links =
        link_movies::<PlatformRecord>(conn, Relation::MoviePlatform, LinkMode::Replace, &groups)?;

    Ok(PersistOutcome {
        summary: UpsertSummary::default(),
        linked: links.linked,
        unresolved: links.unresolved,
    })
}
