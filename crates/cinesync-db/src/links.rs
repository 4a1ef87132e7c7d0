//! Movie relationship rows (`movie_genres`, `movie_platforms`, `movie_companies`).

use std::collections::HashSet;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::error::DependencyNotResolved;
use crate::movies::MovieRecord;
use crate::upsert::{Keyed, resolve_ids};

/// A join table between movies and another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `movie_genres`.
    MovieGenre,
    /// `movie_platforms`.
    MoviePlatform,
    /// `movie_companies`.
    MovieCompany,
}

impl Relation {
    /// Join table name.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::MovieGenre => "movie_genres",
            Self::MoviePlatform => "movie_platforms",
            Self::MovieCompany => "movie_companies",
        }
    }

    /// Column referencing the non-movie endpoint.
    const fn target_column(self) -> &'static str {
        match self {
            Self::MovieGenre => "genre_id",
            Self::MoviePlatform => "platform_id",
            Self::MovieCompany => "company_id",
        }
    }
}

/// How existing rows of a movie are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Keep existing rows and add missing ones.
    Append,
    /// Drop the movie's existing rows first so the set mirrors the input.
    Replace,
}

/// Result of one link call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkOutcome {
    /// Rows created.
    pub linked: usize,
    /// Pairs skipped because an endpoint had no stored row.
    pub unresolved: Vec<DependencyNotResolved>,
}

/// Links each movie (by TMDB ID) to its targets (by external key).
///
/// Both endpoints are resolved against stored rows first; a pair whose
/// movie or target has no row is skipped and reported, the rest are
/// written with `INSERT OR IGNORE`.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn link_movies<T: Keyed>(
    conn: &Connection,
    relation: Relation,
    mode: LinkMode,
    groups: &[(u64, &[T::Key])],
) -> Result<LinkOutcome> {
    let mut outcome = LinkOutcome::default();
    if groups.is_empty() {
        return Ok(outcome);
    }

    let tx = conn
        .unchecked_transaction()
        .context("failed to begin transaction")?;

    let movie_keys: Vec<u64> = groups.iter().map(|(movie, _)| *movie).collect();
    let mut seen: HashSet<&T::Key> = HashSet::new();
    let target_keys: Vec<T::Key> = groups
        .iter()
        .flat_map(|(_, targets)| targets.iter())
        .filter(|key| seen.insert(*key))
        .cloned()
        .collect();

    let movie_ids = resolve_ids::<MovieRecord>(&tx, &movie_keys)?;
    let target_ids = resolve_ids::<T>(&tx, &target_keys)?;

    {
        let mut clear = tx
            .prepare(&format!(
                "DELETE FROM {} WHERE movie_id = ?1",
                relation.table()
            ))
            .context("failed to prepare link cleanup")?;
        let mut insert = tx
            .prepare(&format!(
                "INSERT OR IGNORE INTO {} (movie_id, {}) VALUES (?1, ?2)",
                relation.table(),
                relation.target_column()
            ))
            .context("failed to prepare link insert")?;

        for (movie_key, targets) in groups {
            let Some(&movie_id) = movie_ids.get(movie_key) else {
                outcome.unresolved.push(DependencyNotResolved::report(
                    relation.table(),
                    MovieRecord::ENTITY,
                    movie_key,
                ));
                continue;
            };

            if mode == LinkMode::Replace {
                clear.execute([movie_id]).with_context(|| {
                    format!("failed to clear {} of movie {movie_key}", relation.table())
                })?;
            }

            for target in *targets {
                let Some(&target_id) = target_ids.get(target) else {
                    outcome.unresolved.push(DependencyNotResolved::report(
                        relation.table(),
                        T::ENTITY,
                        format!("{target:?}"),
                    ));
                    continue;
                };
                let rows = insert
                    .execute([movie_id, target_id])
                    .with_context(|| format!("failed to link movie {movie_key} to {target:?}"))?;
                outcome.linked = outcome.linked.saturating_add(rows);
            }
        }
    }

    tx.commit()
        .with_context(|| format!("failed to commit {}", relation.table()))?;
    Ok(outcome)
}
