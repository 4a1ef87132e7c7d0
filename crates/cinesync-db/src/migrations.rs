//! Schema version management using `PRAGMA user_version`.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema version.
const CURRENT_VERSION: u32 = 3;

/// Runs database migrations up to `CURRENT_VERSION`.
///
/// # Errors
///
/// Returns an error if any SQL statement fails.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version")?;

    if version < 1 {
        migrate_v1(conn).context("migration to v1 failed")?;
    }
    if version < 2 {
        migrate_v2(conn).context("migration to v2 failed")?;
    }
    if version < 3 {
        migrate_v3(conn).context("migration to v3 failed")?;
    }

    conn.pragma_update(None, "user_version", CURRENT_VERSION)
        .context("failed to update user_version")?;

    Ok(())
}

/// Migration to v1: catalog core (`genres`, `platforms`, `movies`) and their joins.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS genres (
            id       INTEGER PRIMARY KEY,
            tmdb_id  INTEGER NOT NULL UNIQUE,
            name     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS platforms (
            id                INTEGER PRIMARY KEY,
            tmdb_id           INTEGER NOT NULL UNIQUE,
            name              TEXT NOT NULL,
            logo_path         TEXT,
            display_priority  INTEGER
        );

        CREATE TABLE IF NOT EXISTS movies (
            id                 INTEGER PRIMARY KEY,
            tmdb_id            INTEGER NOT NULL UNIQUE,
            title              TEXT NOT NULL,
            original_title     TEXT,
            original_language  TEXT,
            overview           TEXT,
            release_date       TEXT,
            adult              INTEGER NOT NULL DEFAULT 0,
            video              INTEGER NOT NULL DEFAULT 0,
            popularity         REAL NOT NULL DEFAULT 0,
            vote_average       REAL NOT NULL DEFAULT 0,
            vote_count         INTEGER NOT NULL DEFAULT 0,
            poster_path        TEXT,
            backdrop_path      TEXT,
            status             TEXT,
            runtime            INTEGER,
            updated_at         TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS movie_genres (
            movie_id  INTEGER NOT NULL REFERENCES movies(id),
            genre_id  INTEGER NOT NULL REFERENCES genres(id),
            PRIMARY KEY (movie_id, genre_id)
        );

        CREATE TABLE IF NOT EXISTS movie_platforms (
            movie_id     INTEGER NOT NULL REFERENCES movies(id),
            platform_id  INTEGER NOT NULL REFERENCES platforms(id),
            PRIMARY KEY (movie_id, platform_id)
        );

        CREATE INDEX IF NOT EXISTS idx_movies_popularity ON movies(popularity);

        CREATE TRIGGER IF NOT EXISTS trg_movies_touch
        AFTER UPDATE OF title, overview, vote_average, vote_count, popularity, status, runtime
        ON movies
        BEGIN
            UPDATE movies SET updated_at = datetime('now') WHERE id = NEW.id;
        END;",
    )
    .context("failed to create catalog tables")?;

    Ok(())
}

/// Migration to v2: `people`, credits and media tables.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS people (
            id                    INTEGER PRIMARY KEY,
            tmdb_id               INTEGER NOT NULL UNIQUE,
            name                  TEXT NOT NULL,
            original_name         TEXT,
            gender                TEXT NOT NULL DEFAULT 'UNKNOWN',
            known_for_department  TEXT,
            profile_path          TEXT,
            adult                 INTEGER NOT NULL DEFAULT 0,
            popularity            REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS cast_credits (
            id          INTEGER PRIMARY KEY,
            credit_id   TEXT NOT NULL UNIQUE,
            movie_id    INTEGER NOT NULL REFERENCES movies(id),
            person_id   INTEGER NOT NULL REFERENCES people(id),
            character   TEXT,
            cast_order  INTEGER
        );

        CREATE TABLE IF NOT EXISTS crew_credits (
            id          INTEGER PRIMARY KEY,
            credit_id   TEXT NOT NULL UNIQUE,
            movie_id    INTEGER NOT NULL REFERENCES movies(id),
            person_id   INTEGER NOT NULL REFERENCES people(id),
            department  TEXT,
            job         TEXT
        );

        CREATE TABLE IF NOT EXISTS images (
            id            INTEGER PRIMARY KEY,
            file_path     TEXT NOT NULL UNIQUE,
            movie_id      INTEGER NOT NULL REFERENCES movies(id),
            kind          TEXT NOT NULL,
            width         INTEGER NOT NULL DEFAULT 0,
            height        INTEGER NOT NULL DEFAULT 0,
            aspect_ratio  REAL NOT NULL DEFAULT 0,
            iso_639_1     TEXT
        );

        CREATE TABLE IF NOT EXISTS videos (
            id          INTEGER PRIMARY KEY,
            tmdb_key    TEXT NOT NULL UNIQUE,
            movie_id    INTEGER NOT NULL REFERENCES movies(id),
            name        TEXT,
            site        TEXT,
            video_type  TEXT,
            video_key   TEXT NOT NULL,
            iso_639_1   TEXT,
            official    INTEGER NOT NULL DEFAULT 0,
            url         TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cast_credits_movie_id ON cast_credits(movie_id);
        CREATE INDEX IF NOT EXISTS idx_cast_credits_person_id ON cast_credits(person_id);
        CREATE INDEX IF NOT EXISTS idx_crew_credits_movie_id ON crew_credits(movie_id);
        CREATE INDEX IF NOT EXISTS idx_crew_credits_person_id ON crew_credits(person_id);
        CREATE INDEX IF NOT EXISTS idx_images_movie_id ON images(movie_id);
        CREATE INDEX IF NOT EXISTS idx_videos_movie_id ON videos(movie_id);",
    )
    .context("failed to create people/credits/media tables")?;

    Ok(())
}

/// Migration to v3: production companies and KOFIC box office.
fn migrate_v3(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS companies (
            id              INTEGER PRIMARY KEY,
            tmdb_id         INTEGER NOT NULL UNIQUE,
            name            TEXT NOT NULL,
            origin_country  TEXT,
            logo_path       TEXT
        );

        CREATE TABLE IF NOT EXISTS movie_companies (
            movie_id    INTEGER NOT NULL REFERENCES movies(id),
            company_id  INTEGER NOT NULL REFERENCES companies(id),
            PRIMARY KEY (movie_id, company_id)
        );

        CREATE TABLE IF NOT EXISTS kofic_movies (
            id         INTEGER PRIMARY KEY,
            movie_cd   TEXT NOT NULL UNIQUE,
            name       TEXT NOT NULL,
            open_date  TEXT,
            movie_id   INTEGER REFERENCES movies(id)
        );

        CREATE TABLE IF NOT EXISTS box_office (
            target_date     TEXT NOT NULL,
            rank            INTEGER NOT NULL,
            kofic_movie_id  INTEGER NOT NULL REFERENCES kofic_movies(id),
            audience_count  INTEGER NOT NULL DEFAULT 0,
            audience_acc    INTEGER NOT NULL DEFAULT 0,
            audience_inten  INTEGER NOT NULL DEFAULT 0,
            sales_amount    INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (target_date, rank)
        );

        CREATE INDEX IF NOT EXISTS idx_kofic_movies_movie_id ON kofic_movies(movie_id);",
    )
    .context("failed to create companies/kofic tables")?;

    Ok(())
}
