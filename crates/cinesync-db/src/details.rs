//! Movie detail refresh: runtime, release status and production companies.

use anyhow::{Context, Result};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

use crate::error::DependencyNotResolved;
use crate::links::{LinkMode, Relation, link_movies};
use crate::movies::MovieRecord;
use crate::upsert::{Keyed, PersistOutcome, Upsert, UpsertSummary, upsert};

/// A production company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRecord {
    /// TMDB company ID.
    pub tmdb_id: u64,
    /// Company name.
    pub name: String,
    /// Origin country (ISO 3166-1).
    pub origin_country: Option<String>,
    /// Logo image path.
    pub logo_path: Option<String>,
}

impl Keyed for CompanyRecord {
    type Key = u64;
    const ENTITY: &'static str = "company";
    const TABLE: &'static str = "companies";
    const KEY_COLUMN: &'static str = "tmdb_id";
}

impl Upsert for CompanyRecord {
    type Snapshot = (String, Option<String>);
    const COLUMNS: &'static [&'static str] = &["tmdb_id", "name", "origin_country", "logo_path"];
    const REFRESHABLE: &'static [&'static str] = &["name", "logo_path"];

    fn key(&self) -> u64 {
        self.tmdb_id
    }

    fn snapshot(&self) -> Self::Snapshot {
        (self.name.clone(), self.logo_path.clone())
    }

    fn read_snapshot(row: &Row<'_>) -> rusqlite::Result<Self::Snapshot> {
        Ok((row.get(2)?, row.get(3)?))
    }

    fn insert_values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.tmdb_id,
            &self.name,
            &self.origin_country,
            &self.logo_path,
        ]
    }

    fn refresh_values(&self) -> Vec<&dyn ToSql> {
        vec![&self.name, &self.logo_path]
    }
}

/// Detail fields of one stored movie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailsRecord {
    /// TMDB movie ID.
    pub movie_tmdb_id: u64,
    /// Runtime in minutes.
    pub runtime: Option<u32>,
    /// Release status.
    pub status: Option<String>,
    /// Production companies.
    pub companies: Vec<CompanyRecord>,
}

/// Refreshes runtime and status, upserts companies and links them.
///
/// The summary counts refreshed movies as `updated` plus the company
/// upsert; a movie without a stored row is reported and skipped.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn persist_details(conn: &Connection, records: &[DetailsRecord]) -> Result<PersistOutcome> {
    let mut unresolved = Vec::new();
    let mut refreshed = UpsertSummary::default();

    {
        let tx = conn
            .unchecked_transaction()
            .context("failed to begin transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    "UPDATE movies SET runtime = ?1, status = ?2
                     WHERE tmdb_id = ?3
                       AND (runtime IS NOT ?1 OR status IS NOT ?2)",
                )
                .context("failed to prepare details update")?;
            let mut exists = tx
                .prepare("SELECT 1 FROM movies WHERE tmdb_id = ?1")
                .context("failed to prepare movie lookup")?;

            for record in records {
                if !exists
                    .exists([record.movie_tmdb_id])
                    .with_context(|| format!("failed to look up movie {}", record.movie_tmdb_id))?
                {
                    unresolved.push(DependencyNotResolved::report(
                        "movies",
                        MovieRecord::ENTITY,
                        record.movie_tmdb_id,
                    ));
                    continue;
                }
                let rows = stmt
                    .execute(rusqlite::params![
                        record.runtime,
                        record.status,
                        record.movie_tmdb_id
                    ])
                    .with_context(|| {
                        format!("failed to update details of movie {}", record.movie_tmdb_id)
                    })?;
                refreshed.updated = refreshed.updated.saturating_add(1);
                if rows == 0 {
                    refreshed.unchanged = refreshed.unchanged.saturating_add(1);
                }
            }
        }
        tx.commit().context("failed to commit details update")?;
    }

    let companies: Vec<CompanyRecord> = records
        .iter()
        .flat_map(|r| r.companies.iter().cloned())
        .collect();
    let company_outcome = upsert(conn, &companies)?;

    let company_keys: Vec<(u64, Vec<u64>)> = records
        .iter()
        .map(|r| (r.movie_tmdb_id, r.companies.iter().map(|c| c.tmdb_id).collect()))
        .collect();
    let groups: Vec<(u64, &[u64])> = company_keys
        .iter()
        .map(|(movie, keys)| (*movie, keys.as_slice()))
        .collect();
    let links =
        link_movies::<CompanyRecord>(conn, Relation::MovieCompany, LinkMode::Replace, &groups)?;
    unresolved.extend(links.unresolved);

    Ok(PersistOutcome {
        summary: refreshed.merge(company_outcome.summary),
        linked: links.linked,
        unresolved,
    })
}
