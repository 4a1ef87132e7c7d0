//! Read-only queries over the stored catalog.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

/// A stored movie as seen by lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMovie {
    /// Internal id.
    pub id: i64,
    /// TMDB movie ID.
    pub tmdb_id: u64,
    /// Localized title.
    pub title: String,
    /// Popularity score.
    pub popularity: f64,
}

/// Tables reported by [`table_counts`].
const COUNTED_TABLES: &[&str] = &[
    "genres",
    "platforms",
    "movies",
    "movie_genres",
    "movie_platforms",
    "people",
    "cast_credits",
    "crew_credits",
    "images",
    "videos",
    "companies",
    "movie_companies",
    "kofic_movies",
    "box_office",
];

/// Number of stored movies.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_movies(conn: &Connection) -> Result<usize> {
    conn.query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))
        .context("failed to count movies")
}

/// TMDB IDs of stored movies in storage order, one page at a time.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_movie_tmdb_ids(conn: &Connection, offset: usize, limit: usize) -> Result<Vec<u64>> {
    let mut stmt = conn
        .prepare("SELECT tmdb_id FROM movies ORDER BY id LIMIT ?1 OFFSET ?2")
        .context("failed to prepare movie listing")?;

    let rows = stmt
        .query_map(rusqlite::params![limit, offset], |row| row.get(0))
        .context("failed to list movies")?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to read movies rows")
}

/// Internal id of the movie with `tmdb_id`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn find_movie_id(conn: &Connection, tmdb_id: u64) -> Result<Option<i64>> {
    conn.query_row("SELECT id FROM movies WHERE tmdb_id = ?1", [tmdb_id], |row| {
        row.get(0)
    })
    .optional()
    .with_context(|| format!("failed to look up movie {tmdb_id}"))
}

/// Movies whose title contains `fragment` (ASCII case-insensitive), most
/// popular first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn find_movies_by_title(
    conn: &Connection,
    fragment: &str,
    limit: usize,
) -> Result<Vec<StoredMovie>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, tmdb_id, title, popularity
             FROM movies
             WHERE title LIKE '%' || ?1 || '%' ESCAPE '\\'
             ORDER BY popularity DESC, id
             LIMIT ?2",
        )
        .context("failed to prepare title search")?;

    let rows = stmt
        .query_map(rusqlite::params![escape_like(fragment), limit], |row| {
            Ok(StoredMovie {
                id: row.get(0)?,
                tmdb_id: row.get(1)?,
                title: row.get(2)?,
                popularity: row.get(3)?,
            })
        })
        .with_context(|| format!("failed to search movies by title {fragment}"))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to read movies rows")
}

/// Row count per catalog table.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn table_counts(conn: &Connection) -> Result<Vec<(&'static str, u64)>> {
    COUNTED_TABLES
        .iter()
        .map(|table| {
            let count: u64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .with_context(|| format!("failed to count {table}"))?;
            Ok((*table, count))
        })
        .collect()
}

/// Escapes `LIKE` wildcards so `fragment` matches literally.
fn escape_like(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
