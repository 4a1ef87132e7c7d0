//! Database connection management.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rusqlite::Connection;

use super::migrations::run_migrations;

/// Database file name.
const DB_FILE: &str = "cinesync.db";

/// Opens (or creates) the database and runs migrations.
///
/// - If `dir` is `Some`, uses `{dir}/cinesync.db`.
/// - Otherwise uses `$XDG_DATA_HOME/cinesync/cinesync.db`, falling back to
///   `~/.local/share/cinesync/cinesync.db`.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrations fail.
pub fn open_db(dir: Option<&PathBuf>) -> Result<Connection> {
    let db_path = resolve_db_path(dir)?;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    prepare(&conn)?;
    Ok(conn)
}

/// Opens a migrated in-memory database.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrations fail.
pub fn open_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    prepare(&conn)?;
    Ok(conn)
}

/// Enables foreign keys and runs migrations.
fn prepare(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)
        .context("failed to enable foreign keys")?;
    run_migrations(conn).context("database migration failed")
}

/// Resolves the database file path.
///
/// `{dir}/cinesync.db` when `dir` is given, else under `$XDG_DATA_HOME`
/// (falling back to `~/.local/share`).
fn resolve_db_path(dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(d) = dir {
        return Ok(d.join(DB_FILE));
    }
    let data_home = std::env::var_os("XDG_DATA_HOME").map(PathBuf::from);
    let home = std::env::var_os("HOME").map(PathBuf::from);
    default_db_path(data_home.as_deref(), home.as_deref())
}

fn default_db_path(data_home: Option<&Path>, home: Option<&Path>) -> Result<PathBuf> {
    let base = match (data_home.filter(|p| !p.as_os_str().is_empty()), home) {
        (Some(data_home), _) => data_home.to_path_buf(),
        (None, Some(home)) => home.join(".local").join("share"),
        (None, None) => bail!("HOME environment variable is not set"),
    };
    Ok(base.join("cinesync").join(DB_FILE))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_open_db_in_temp_dir() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let dir_path = dir.path().join("nested");

        // Act
        let conn = open_db(Some(&dir_path)).unwrap();

        // Assert
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert!(version > 0);
        assert!(dir_path.join(DB_FILE).exists());
    }

    #[test]
    fn test_foreign_keys_enabled() {
        // Arrange & Act
        let conn = open_memory_db().unwrap();

        // Assert
        let enabled: bool = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert!(enabled);
    }

    #[test]
    fn test_resolve_db_path_with_dir() {
        // Arrange
        let dir = PathBuf::from("/var/lib/cinesync");

        // Act
        let path = resolve_db_path(Some(&dir)).unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/var/lib/cinesync/cinesync.db"));
    }

    #[test]
    fn test_default_db_path_prefers_xdg_data_home() {
        // Arrange & Act
        let xdg = default_db_path(Some(Path::new("/data")), Some(Path::new("/home/u"))).unwrap();
        let empty = default_db_path(Some(Path::new("")), Some(Path::new("/home/u"))).unwrap();

        // Assert
        assert_eq!(xdg, PathBuf::from("/data/cinesync/cinesync.db"));
        assert_eq!(empty, PathBuf::from("/home/u/.local/share/cinesync/cinesync.db"));
    }

    #[test]
    fn test_default_db_path_without_home() {
        // Arrange & Act & Assert
        assert!(default_db_path(None, None).is_err());
    }
}
