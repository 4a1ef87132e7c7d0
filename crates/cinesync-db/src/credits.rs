//! Cast and crew credits.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

use crate::error::DependencyNotResolved;
use crate::movies::MovieRecord;
use crate::people::PersonRecord;
use crate::upsert::{Keyed, PersistOutcome, Upsert, resolve_ids, upsert_in};

/// A cast credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastRecord {
    /// TMDB credit ID.
    pub credit_id: String,
    /// TMDB movie ID.
    pub movie_tmdb_id: u64,
    /// TMDB person ID.
    pub person_tmdb_id: u64,
    /// Character name.
    pub character: Option<String>,
    /// Billing order.
    pub order: Option<u32>,
}

/// A crew credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrewRecord {
    /// TMDB credit ID.
    pub credit_id: String,
    /// TMDB movie ID.
    pub movie_tmdb_id: u64,
    /// TMDB person ID.
    pub person_tmdb_id: u64,
    /// Department.
    pub department: Option<String>,
    /// Job title.
    pub job: Option<String>,
}

/// People and credits of one batch of movies.
///
/// `people` holds each person once even when they appear in several
/// credits of the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreditBatch {
    /// Distinct people.
    pub people: Vec<PersonRecord>,
    /// Cast credits.
    pub cast: Vec<CastRecord>,
    /// Crew credits.
    pub crew: Vec<CrewRecord>,
}

/// A cast credit bound to internal ids.
#[derive(Debug)]
struct CastRow<'a> {
    record: &'a CastRecord,
    movie_id: i64,
    person_id: i64,
}

impl Keyed for CastRow<'_> {
    type Key = String;
    const ENTITY: &'static str = "cast credit";
    const TABLE: &'static str = "cast_credits";
    const KEY_COLUMN: &'static str = "credit_id";
}

impl Upsert for CastRow<'_> {
    type Snapshot = (Option<String>, Option<u32>);
    const COLUMNS: &'static [&'static str] =
        &["credit_id", "movie_id", "person_id", "character", "cast_order"];
    const REFRESHABLE: &'static [&'static str] = &["character", "cast_order"];

    fn key(&self) -> String {
        self.record.credit_id.clone()
    }

    fn snapshot(&self) -> Self::Snapshot {
        (self.record.character.clone(), self.record.order)
    }

    fn read_snapshot(row: &Row<'_>) -> rusqlite::Result<Self::Snapshot> {
        Ok((row.get(2)?, row.get(3)?))
    }

    fn insert_values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.record.credit_id,
            &self.movie_id,
            &self.person_id,
            &self.record.character,
            &self.record.order,
        ]
    }

    fn refresh_values(&self) -> Vec<&dyn ToSql> {
        vec![&self.record.character, &self.record.order]
    }
}

/// A crew credit bound to internal ids.
#[derive(Debug)]
struct CrewRow<'a> {
    record: &'a CrewRecord,
    movie_id: i64,
    person_id: i64,
}

impl Keyed for CrewRow<'_> {
    type Key = String;
    const ENTITY: &'static str = "crew credit";
    const TABLE: &'static str = "crew_credits";
    const KEY_COLUMN: &'static str = "credit_id";
}

impl Upsert for CrewRow<'_> {
    type Snapshot = (Option<String>, Option<String>);
    const COLUMNS: &'static [&'static str] =
        &["credit_id", "movie_id", "person_id", "department", "job"];
    const REFRESHABLE: &'static [&'static str] = &["department", "job"];

    fn key(&self) -> String {
        self.record.credit_id.clone()
    }

    fn snapshot(&self) -> Self::Snapshot {
        (self.record.department.clone(), self.record.job.clone())
    }

    fn read_snapshot(row: &Row<'_>) -> rusqlite::Result<Self::Snapshot> {
        Ok((row.get(2)?, row.get(3)?))
    }

    fn insert_values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.record.credit_id,
            &self.movie_id,
            &self.person_id,
            &self.record.department,
            &self.record.job,
        ]
    }

    fn refresh_values(&self) -> Vec<&dyn ToSql> {
        vec![&self.record.department, &self.record.job]
    }
}

/// Internal ids the credits of one batch point at.
struct Endpoints {
    movies: HashMap<u64, i64>,
    people: HashMap<u64, i64>,
}

impl Endpoints {
    /// Resolves `(movie, person)` or reports the missing side.
    fn bind(
        &self,
        relation: &'static str,
        movie_tmdb_id: u64,
        person_tmdb_id: u64,
        unresolved: &mut Vec<DependencyNotResolved>,
    ) -> Option<(i64, i64)> {
        let Some(&movie_id) = self.movies.get(&movie_tmdb_id) else {
            unresolved.push(DependencyNotResolved::report(
                relation,
                MovieRecord::ENTITY,
                movie_tmdb_id,
            ));
            return None;
        };
        let Some(&person_id) = self.people.get(&person_tmdb_id) else {
            unresolved.push(DependencyNotResolved::report(
                relation,
                PersonRecord::ENTITY,
                person_tmdb_id,
            ));
            return None;
        };
        Some((movie_id, person_id))
    }
}

/// Upserts people, then the cast and crew credits pointing at them, in
/// one transaction.
///
/// Credits whose movie or person has no stored row are skipped and
/// reported. The summary adds up people, cast and crew.
///
/// # Errors
///
/// Returns an error if the database operation fails; nothing of the batch
/// is kept.
pub fn persist_credits(conn: &Connection, batch: &CreditBatch) -> Result<PersistOutcome> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin transaction")?;
    let people = upsert_in(&tx, &batch.people)?;

    let mut person_ids = people.ids;
    let missing_people: Vec<u64> = batch
        .cast
        .iter()
        .map(|c| c.person_tmdb_id)
        .chain(batch.crew.iter().map(|c| c.person_tmdb_id))
        .filter(|id| !person_ids.contains_key(id))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    person_ids.extend(resolve_ids::<PersonRecord>(&tx, &missing_people)?);

    let movie_keys: Vec<u64> = batch
        .cast
        .iter()
        .map(|c| c.movie_tmdb_id)
        .chain(batch.crew.iter().map(|c| c.movie_tmdb_id))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let endpoints = Endpoints {
        movies: resolve_ids::<MovieRecord>(&tx, &movie_keys)?,
        people: person_ids,
    };

    let mut unresolved = Vec::new();
    let cast_rows: Vec<CastRow<'_>> = batch
        .cast
        .iter()
        .filter_map(|record| {
            let (movie_id, person_id) = endpoints.bind(
                CastRow::TABLE,
                record.movie_tmdb_id,
                record.person_tmdb_id,
                &mut unresolved,
            )?;
            Some(CastRow {
                record,
                movie_id,
                person_id,
            })
        })
        .collect();
    let crew_rows: Vec<CrewRow<'_>> = batch
        .crew
        .iter()
        .filter_map(|record| {
            let (movie_id, person_id) = endpoints.bind(
                CrewRow::TABLE,
                record.movie_tmdb_id,
                record.person_tmdb_id,
                &mut unresolved,
            )?;
            Some(CrewRow {
                record,
                movie_id,
                person_id,
            })
        })
        .collect();

    let cast = upsert_in(&tx, &cast_rows)?;
    let crew = upsert_in(&tx, &crew_rows)?;
    tx.commit().context("failed to commit credits")?;

    Ok(PersistOutcome {
        summary: people.summary.merge(cast.summary).merge(crew.summary),
        linked: cast.ids.len().saturating_add(crew.ids.len()),
        unresolved,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use crate::connection::open_memory_db;
    use crate::movies::persist_movies;
    use crate::movies::tests::movie;
    use crate::people::Gender;

    fn person(tmdb_id: u64, name: &str) -> PersonRecord {
        PersonRecord {
            tmdb_id,
            name: String::from(name),
            original_name: None,
            gender: Gender::Male,
            known_for_department: Some(String::from("Acting")),
            profile_path: None,
            adult: false,
            popularity: 10.0,
        }
    }

    fn cast(credit_id: &str, movie_tmdb_id: u64, person_tmdb_id: u64) -> CastRecord {
        CastRecord {
            credit_id: String::from(credit_id),
            movie_tmdb_id,
            person_tmdb_id,
            character: Some(String::from("기택")),
            order: Some(0),
        }
    }

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_one_person_referenced_by_five_credits() {
        // Arrange: the same person in five movies of one batch
        let conn = open_memory_db().unwrap();
        let movies: Vec<MovieRecord> = (1..=5).map(|id| movie(id, "m")).collect();
        persist_movies(&conn, &movies).unwrap();
        let batch = CreditBatch {
            people: vec![person(17_419, "송강호")],
            cast: (1..=5)
                .map(|id| cast(&format!("credit-{id}"), id, 17_419))
                .collect(),
            crew: Vec::new(),
        };

        // Act
        let outcome = persist_credits(&conn, &batch).unwrap();

        // Assert
        assert!(outcome.unresolved.is_empty());
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM people WHERE tmdb_id = 17419"), 1);
        assert_eq!(
            count(
                &conn,
                "SELECT COUNT(*) FROM cast_credits c JOIN people p ON p.id = c.person_id WHERE p.tmdb_id = 17419"
            ),
            5
        );
    }

    #[test]
    fn test_credit_for_unknown_movie_is_skipped() {
        // Arrange
        let conn = open_memory_db().unwrap();
        persist_movies(&conn, &[movie(550, "파이트 클럽")]).unwrap();
        let batch = CreditBatch {
            people: vec![person(819, "Edward Norton")],
            cast: vec![cast("a", 550, 819), cast("b", 404, 819)],
            crew: vec![CrewRecord {
                credit_id: String::from("c"),
                movie_tmdb_id: 550,
                person_tmdb_id: 7_467,
                department: Some(String::from("Directing")),
                job: Some(String::from("Director")),
            }],
        };

        // Act
        let outcome = persist_credits(&conn, &batch).unwrap();

        // Assert
        assert_eq!(outcome.linked, 1);
        assert_eq!(outcome.unresolved.len(), 2);
        assert!(
            outcome
                .unresolved
                .iter()
                .any(|u| u.entity == "movie" && u.external_id == "404")
        );
        assert!(
            outcome
                .unresolved
                .iter()
                .any(|u| u.entity == "person" && u.relation == "crew_credits")
        );
    }

    #[test]
    fn test_rerun_updates_character_only() {
        // Arrange
        let conn = open_memory_db().unwrap();
        persist_movies(&conn, &[movie(550, "파이트 클럽")]).unwrap();
        let mut batch = CreditBatch {
            people: vec![person(819, "Edward Norton")],
            cast: vec![cast("a", 550, 819)],
            crew: Vec::new(),
        };
        persist_credits(&conn, &batch).unwrap();
        batch.cast[0].character = Some(String::from("The Narrator"));

        // Act
        let outcome = persist_credits(&conn, &batch).unwrap();

        // Assert
        assert_eq!(outcome.summary.inserted, 0);
        assert_eq!(outcome.summary.updated, 2);
        assert_eq!(outcome.summary.unchanged, 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM cast_credits"), 1);
    }

    #[test]
    fn test_failed_crew_write_keeps_nothing() {
        // Arrange: crew inserts abort after people and cast were written
        let conn = open_memory_db().unwrap();
        persist_movies(&conn, &[movie(550, "파이트 클럽")]).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_crew BEFORE INSERT ON crew_credits
             BEGIN SELECT RAISE(ABORT, 'crew rejected'); END;",
        )
        .unwrap();
        let batch = CreditBatch {
            people: vec![person(819, "Edward Norton"), person(7_467, "David Fincher")],
            cast: vec![cast("a", 550, 819)],
            crew: vec![CrewRecord {
                credit_id: String::from("c"),
                movie_tmdb_id: 550,
                person_tmdb_id: 7_467,
                department: Some(String::from("Directing")),
                job: Some(String::from("Director")),
            }],
        };

        // Act
        let result = persist_credits(&conn, &batch);

        // Assert
        assert!(result.is_err());
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM people"), 0);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM cast_credits"), 0);
    }
}
