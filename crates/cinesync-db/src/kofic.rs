//! KOFIC box-office records and their TMDB mapping.

use anyhow::{Context, Result};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

use crate::error::DependencyNotResolved;
use crate::upsert::{Keyed, PersistOutcome, Upsert, upsert};

/// A movie as identified by KOFIC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KoficMovieRecord {
    /// KOFIC movie code (natural key).
    pub movie_cd: String,
    /// Korean title.
    pub name: String,
    /// Opening date (YYYY-MM-DD).
    pub open_date: Option<String>,
}

impl Keyed for KoficMovieRecord {
    type Key = String;
    const ENTITY: &'static str = "kofic movie";
    const TABLE: &'static str = "kofic_movies";
    const KEY_COLUMN: &'static str = "movie_cd";
}

impl Upsert for KoficMovieRecord {
    type Snapshot = (String, Option<String>);
    // `movie_id` is owned by the mapping stage and never written here.
    const COLUMNS: &'static [&'static str] = &["movie_cd", "name", "open_date"];
    const REFRESHABLE: &'static [&'static str] = &["name", "open_date"];

    fn key(&self) -> String {
        self.movie_cd.clone()
    }

    fn snapshot(&self) -> Self::Snapshot {
        (self.name.clone(), self.open_date.clone())
    }

    fn read_snapshot(row: &Row<'_>) -> rusqlite::Result<Self::Snapshot> {
        Ok((row.get(2)?, row.get(3)?))
    }

    fn insert_values(&self) -> Vec<&dyn ToSql> {
        vec![&self.movie_cd, &self.name, &self.open_date]
    }

    fn refresh_values(&self) -> Vec<&dyn ToSql> {
        vec![&self.name, &self.open_date]
    }
}

/// One ranking entry of a daily box office.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxOfficeRecord {
    /// Target date (YYYY-MM-DD).
    pub target_date: String,
    /// Rank on that date.
    pub rank: u32,
    /// KOFIC movie code.
    pub movie_cd: String,
    /// Audience on that date.
    pub audience_count: i64,
    /// Cumulative audience.
    pub audience_acc: i64,
    /// Audience change from the previous day.
    pub audience_inten: i64,
    /// Sales on that date.
    pub sales_amount: i64,
}

/// A KOFIC movie without a TMDB mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmappedKoficMovie {
    /// Internal id.
    pub id: i64,
    /// KOFIC movie code.
    pub movie_cd: String,
    /// Korean title.
    pub name: String,
    /// Opening date (YYYY-MM-DD).
    pub open_date: Option<String>,
}

/// Upserts the KOFIC movies of a daily ranking, then the ranking rows.
///
/// Ranking rows are keyed by `(target_date, rank)`, so re-running a date
/// overwrites it.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn persist_box_office(
    conn: &Connection,
    movies: &[KoficMovieRecord],
    entries: &[BoxOfficeRecord],
) -> Result<PersistOutcome> {
    let outcome = upsert(conn, movies)?;
    let mut unresolved = Vec::new();
    let mut linked: usize = 0;

    let tx = conn
        .unchecked_transaction()
        .context("failed to begin transaction")?;
    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO box_office (
                    target_date, rank, kofic_movie_id,
                    audience_count, audience_acc, audience_inten, sales_amount
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(target_date, rank) DO UPDATE SET
                    kofic_movie_id = excluded.kofic_movie_id,
                    audience_count = excluded.audience_count,
                    audience_acc = excluded.audience_acc,
                    audience_inten = excluded.audience_inten,
                    sales_amount = excluded.sales_amount",
            )
            .context("failed to prepare box office upsert")?;

        for entry in entries {
            let Some(&kofic_movie_id) = outcome.ids.get(&entry.movie_cd) else {
                unresolved.push(DependencyNotResolved::report(
                    "box_office",
                    KoficMovieRecord::ENTITY,
                    &entry.movie_cd,
                ));
                continue;
            };
            let rows = stmt
                .execute(rusqlite::params![
                    entry.target_date,
                    entry.rank,
                    kofic_movie_id,
                    entry.audience_count,
                    entry.audience_acc,
                    entry.audience_inten,
                    entry.sales_amount,
                ])
                .with_context(|| {
                    format!("failed to upsert box office {} #{}", entry.target_date, entry.rank)
                })?;
            linked = linked.saturating_add(rows);
        }
    }
    tx.commit().context("failed to commit box office upsert")?;

    Ok(PersistOutcome {
        summary: outcome.summary,
        linked,
        unresolved,
    })
}

/// Loads KOFIC movies that have no TMDB mapping yet.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn load_unmapped_kofic_movies(conn: &Connection) -> Result<Vec<UnmappedKoficMovie>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, movie_cd, name, open_date
             FROM kofic_movies
             WHERE movie_id IS NULL
             ORDER BY id",
        )
        .context("failed to prepare unmapped kofic query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(UnmappedKoficMovie {
                id: row.get(0)?,
                movie_cd: row.get(1)?,
                name: row.get(2)?,
                open_date: row.get(3)?,
            })
        })
        .context("failed to query unmapped kofic movies")?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to read kofic_movies rows")
}

/// Maps a KOFIC movie to a stored movie.
///
/// # Errors
///
/// Returns an error if the database operation fails (including an unknown
/// `movie_id`, rejected by the foreign key).
pub fn update_kofic_mapping(conn: &Connection, kofic_movie_id: i64, movie_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE kofic_movies SET movie_id = ?1 WHERE id = ?2",
        rusqlite::params![movie_id, kofic_movie_id],
    )
    .with_context(|| format!("failed to map kofic movie {kofic_movie_id} to movie {movie_id}"))?;
    Ok(())
}
