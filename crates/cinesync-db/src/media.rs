//! Movie images and videos.

use std::collections::HashSet;

use anyhow::Result;
use rusqlite::types::{ToSql, ToSqlOutput};
use rusqlite::{Connection, Row};

use crate::error::DependencyNotResolved;
use crate::movies::MovieRecord;
use crate::upsert::{Keyed, PersistOutcome, Upsert, resolve_ids, upsert};

/// Base URL for full-size TMDB images.
pub const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/original";

/// Image category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Backdrop.
    Backdrop,
    /// Title logo.
    Logo,
    /// Poster.
    Poster,
}

impl ImageKind {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backdrop => "BACKDROP",
            Self::Logo => "LOGO",
            Self::Poster => "POSTER",
        }
    }
}

impl ToSql for ImageKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// A movie image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Image path (natural key).
    pub file_path: String,
    /// TMDB movie ID.
    pub movie_tmdb_id: u64,
    /// Category.
    pub kind: ImageKind,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Aspect ratio.
    pub aspect_ratio: f64,
    /// Language (ISO 639-1).
    pub iso_639_1: Option<String>,
}

impl ImageRecord {
    /// Full-size image URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{IMAGE_BASE_URL}{}", self.file_path)
    }
}

/// A movie video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    /// TMDB video ID (natural key).
    pub tmdb_key: String,
    /// TMDB movie ID.
    pub movie_tmdb_id: u64,
    /// Title.
    pub name: Option<String>,
    /// Hosting site.
    pub site: Option<String>,
    /// Video type (`Trailer`, `Teaser`, ...).
    pub video_type: Option<String>,
    /// Site-specific key.
    pub video_key: String,
    /// Language (ISO 639-1).
    pub iso_639_1: Option<String>,
    /// Official flag.
    pub official: bool,
    /// Playback URL.
    pub url: String,
}

impl VideoRecord {
    /// Playback URL for a video hosted on `site`.
    #[must_use]
    pub fn playback_url(site: Option<&str>, key: &str) -> String {
        if site == Some("YouTube") {
            format!("https://www.youtube.com/watch?v={key}")
        } else {
            format!("https://www.themoviedb.org/video/play?key={key}")
        }
    }
}

/// An image bound to its movie's internal id.
#[derive(Debug)]
struct ImageRow<'a> {
    record: &'a ImageRecord,
    movie_id: i64,
}

impl Keyed for ImageRow<'_> {
    type Key = String;
    const ENTITY: &'static str = "image";
    const TABLE: &'static str = "images";
    const KEY_COLUMN: &'static str = "file_path";
}

impl Upsert for ImageRow<'_> {
    type Snapshot = (u32, u32, f64);
    const COLUMNS: &'static [&'static str] = &[
        "file_path",
        "movie_id",
        "kind",
        "width",
        "height",
        "aspect_ratio",
        "iso_639_1",
    ];
    const REFRESHABLE: &'static [&'static str] = &["width", "height", "aspect_ratio"];

    fn key(&self) -> String {
        self.record.file_path.clone()
    }

    fn snapshot(&self) -> Self::Snapshot {
        (
            self.record.width,
            self.record.height,
            self.record.aspect_ratio,
        )
    }

    fn read_snapshot(row: &Row<'_>) -> rusqlite::Result<Self::Snapshot> {
        Ok((row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn insert_values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.record.file_path,
            &self.movie_id,
            &self.record.kind,
            &self.record.width,
            &self.record.height,
            &self.record.aspect_ratio,
            &self.record.iso_639_1,
        ]
    }

    fn refresh_values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.record.width,
            &self.record.height,
            &self.record.aspect_ratio,
        ]
    }
}

/// A video bound to its movie's internal id.
#[derive(Debug)]
struct VideoRow<'a> {
    record: &'a VideoRecord,
    movie_id: i64,
}

impl Keyed for VideoRow<'_> {
    type Key = String;
    const ENTITY: &'static str = "video";
    const TABLE: &'static str = "videos";
    const KEY_COLUMN: &'static str = "tmdb_key";
}

impl Upsert for VideoRow<'_> {
    type Snapshot = (Option<String>, bool);
    const COLUMNS: &'static [&'static str] = &[
        "tmdb_key",
        "movie_id",
        "name",
        "site",
        "video_type",
        "video_key",
        "iso_639_1",
        "official",
        "url",
    ];
    const REFRESHABLE: &'static [&'static str] = &["name", "official"];

    fn key(&self) -> String {
        self.record.tmdb_key.clone()
    }

    fn snapshot(&self) -> Self::Snapshot {
        (self.record.name.clone(), self.record.official)
    }

    fn read_snapshot(row: &Row<'_>) -> rusqlite::Result<Self::Snapshot> {
        Ok((row.get(2)?, row.get(3)?))
    }

    fn insert_values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.record.tmdb_key,
            &self.movie_id,
            &self.record.name,
            &self.record.site,
            &self.record.video_type,
            &self.record.video_key,
            &self.record.iso_639_1,
            &self.record.official,
            &self.record.url,
        ]
    }

    fn refresh_values(&self) -> Vec<&dyn ToSql> {
        vec![&self.record.name, &self.record.official]
    }
}

/// Binds each record to its movie's internal id, reporting unknown movies.
fn bind_movies<'a, T, R>(
    conn: &Connection,
    relation: &'static str,
    records: &'a [T],
    movie_of: impl Fn(&T) -> u64,
    make_row: impl Fn(&'a T, i64) -> R,
) -> Result<(Vec<R>, Vec<DependencyNotResolved>)> {
    let keys: Vec<u64> = records
        .iter()
        .map(&movie_of)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let movie_ids = resolve_ids::<MovieRecord>(conn, &keys)?;

    let mut rows = Vec::with_capacity(records.len());
    let mut unresolved = Vec::new();
    for record in records {
        let movie = movie_of(record);
        match movie_ids.get(&movie) {
            Some(&movie_id) => rows.push(make_row(record, movie_id)),
            None => unresolved.push(DependencyNotResolved::report(
                relation,
                MovieRecord::ENTITY,
                movie,
            )),
        }
    }
    Ok((rows, unresolved))
}

/// Upserts images by file path.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn persist_images(conn: &Connection, records: &[ImageRecord]) -> Result<PersistOutcome> {
    let (rows, unresolved) = bind_movies(
        conn,
        ImageRow::TABLE,
        records,
        |r| r.movie_tmdb_id,
        |record, movie_id| ImageRow { record, movie_id },
    )?;
    let outcome = upsert(conn, &rows)?;

    Ok(PersistOutcome {
        summary: outcome.summary,
        linked: 0,
        unresolved,
    })
}

/// Upserts videos by TMDB video ID.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn persist_videos(conn: &Connection, records: &[VideoRecord]) -> Result<PersistOutcome> {
    let (rows, unresolved) = bind_movies(
        conn,
        VideoRow::TABLE,
        records,
        |r| r.movie_tmdb_id,
        |record, movie_id| VideoRow { record, movie_id },
    )?;
    let outcome = upsert(conn, &rows)?;

    Ok(PersistOutcome {
        summary: outcome.summary,
        linked: 0,
        unresolved,
    })
}
