//! Movie records and their genre links.

use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

use crate::genres::GenreRecord;
use crate::links::{LinkMode, Relation, link_movies};
use crate::upsert::{Keyed, PersistOutcome, Upsert, upsert};

/// A movie as listed by TMDB.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
    /// TMDB movie ID.
    pub tmdb_id: u64,
    /// Localized title.
    pub title: String,
    /// Original title.
    pub original_title: Option<String>,
    /// Original language (ISO 639-1).
    pub original_language: Option<String>,
    /// Overview text.
    pub overview: Option<String>,
    /// Release date (YYYY-MM-DD).
    pub release_date: Option<String>,
    /// Adult flag.
    pub adult: bool,
    /// Video flag.
    pub video: bool,
    /// Popularity score.
    pub popularity: f64,
    /// Vote average.
    pub vote_average: f64,
    /// Vote count.
    pub vote_count: u32,
    /// Poster image path.
    pub poster_path: Option<String>,
    /// Backdrop image path.
    pub backdrop_path: Option<String>,
    /// TMDB genre IDs, materialized as `movie_genres` rows.
    pub genre_ids: Vec<u32>,
}

impl Keyed for MovieRecord {
    type Key = u64;
    const ENTITY: &'static str = "movie";
    const TABLE: &'static str = "movies";
    const KEY_COLUMN: &'static str = "tmdb_id";
}

impl Upsert for MovieRecord {
    /// `(title, overview, vote_average, vote_count, popularity)`.
    type Snapshot = (String, Option<String>, f64, u32, f64);
    const COLUMNS: &'static [&'static str] = &[
        "tmdb_id",
        "title",
        "original_title",
        "original_language",
        "overview",
        "release_date",
        "adult",
        "video",
        "popularity",
        "vote_average",
        "vote_count",
        "poster_path",
        "backdrop_path",
    ];
    const REFRESHABLE: &'static [&'static str] =
        &["title", "overview", "vote_average", "vote_count", "popularity"];

    fn key(&self) -> u64 {
        self.tmdb_id
    }

    fn snapshot(&self) -> Self::Snapshot {
        (
            self.title.clone(),
            self.overview.clone(),
            self.vote_average,
            self.vote_count,
            self.popularity,
        )
    }

    fn read_snapshot(row: &Row<'_>) -> rusqlite::Result<Self::Snapshot> {
        Ok((row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?))
    }

    fn insert_values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.tmdb_id,
            &self.title,
            &self.original_title,
            &self.original_language,
            &self.overview,
            &self.release_date,
            &self.adult,
            &self.video,
            &self.popularity,
            &self.vote_average,
            &self.vote_count,
            &self.poster_path,
            &self.backdrop_path,
        ]
    }

    fn refresh_values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.title,
            &self.overview,
            &self.vote_average,
            &self.vote_count,
            &self.popularity,
        ]
    }
}

/// Upserts movies and replaces their genre links.
///
/// Genres must already be stored; an unknown genre ID is reported in
/// `unresolved` and its link skipped.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn persist_movies(conn: &Connection, records: &[MovieRecord]) -> Result<PersistOutcome> {
    let outcome = upsert(conn, records)?;

    let groups: Vec<(u64, &[u32])> = records
        .iter()
        .map(|m| (m.tmdb_id, m.genre_ids.as_slice()))
        .collect();
    let links =
        link_movies::<GenreRecord>(conn, Relation::MovieGenre, LinkMode::Replace, &groups)?;

    Ok(PersistOutcome {
        summary: outcome.summary,
        linked: links.linked,
        unresolved: links.unresolved,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::connection::open_memory_db;
    use crate::genres::persist_genres;

    pub(crate) fn movie(tmdb_id: u64, title: &str) -> MovieRecord {
        MovieRecord {
            tmdb_id,
            title: String::from(title),
            original_title: None,
            original_language: Some(String::from("ko")),
            overview: None,
            release_date: Some(String::from("2019-05-30")),
            adult: false,
            video: false,
            popularity: 1.0,
            vote_average: 8.5,
            vote_count: 100,
            poster_path: None,
            backdrop_path: None,
            genre_ids: Vec::new(),
        }
    }

    #[test]
    fn test_persist_movies_links_genres() {
        // Arrange
        let conn = open_memory_db().unwrap();
        persist_genres(
            &conn,
            &[GenreRecord {
                tmdb_id: 18,
                name: String::from("드라마"),
            }],
        )
        .unwrap();
        let mut parasite = movie(496_243, "기생충");
        parasite.genre_ids = vec![18];

        // Act
        let outcome = persist_movies(&conn, &[parasite]).unwrap();

        // Assert
        assert_eq!(outcome.summary.inserted, 1);
        assert_eq!(outcome.linked, 1);
        assert!(outcome.unresolved.is_empty());
    }

    #[test]
    fn test_refresh_rewrites_only_refreshable_fields() {
        // Arrange
        let conn = open_memory_db().unwrap();
        persist_movies(&conn, &[movie(550, "Fight Club")]).unwrap();
        let mut changed = movie(550, "파이트 클럽");
        changed.vote_count = 200;
        changed.release_date = Some(String::from("1999-10-15"));

        // Act
        let outcome = persist_movies(&conn, &[changed]).unwrap();

        // Assert
        assert_eq!(outcome.summary.updated, 1);
        assert_eq!(outcome.summary.unchanged, 0);
        let (title, votes, release): (String, u32, String) = conn
            .query_row(
                "SELECT title, vote_count, release_date FROM movies WHERE tmdb_id = 550",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(title, "파이트 클럽");
        assert_eq!(votes, 200);
        assert_eq!(release, "2019-05-30");
    }

    #[test]
    fn test_unchanged_movie_is_not_rewritten() {
        // Arrange
        let conn = open_memory_db().unwrap();
        persist_movies(&conn, &[movie(550, "Fight Club")]).unwrap();
        conn.execute(
            "UPDATE movies SET updated_at = '2000-01-01 00:00:00' WHERE tmdb_id = 550",
            [],
        )
        .unwrap();

        // Act
        let outcome = persist_movies(&conn, &[movie(550, "Fight Club")]).unwrap();

        // Assert
        assert_eq!(outcome.summary.unchanged, 1);
        let updated_at: String = conn
            .query_row("SELECT updated_at FROM movies WHERE tmdb_id = 550", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(updated_at, "2000-01-01 00:00:00");
    }
}
