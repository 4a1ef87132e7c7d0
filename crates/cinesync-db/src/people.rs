//! Person records shared by cast and crew credits.

use rusqlite::types::{ToSql, ToSqlOutput};
use rusqlite::Row;

use crate::upsert::{Keyed, Upsert};

/// Gender as stored (`FEMALE`, `MALE`, `UNKNOWN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gender {
    /// Not specified, non-binary, or an unrecognised code.
    #[default]
    Unknown,
    /// TMDB code 1.
    Female,
    /// TMDB code 2.
    Male,
}

impl Gender {
    /// Maps a TMDB gender code.
    #[must_use]
    pub const fn from_tmdb(code: Option<u8>) -> Self {
        match code {
            Some(1) => Self::Female,
            Some(2) => Self::Male,
            _ => Self::Unknown,
        }
    }

    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Female => "FEMALE",
            Self::Male => "MALE",
        }
    }
}

impl ToSql for Gender {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// A cast or crew member.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonRecord {
    /// TMDB person ID.
    pub tmdb_id: u64,
    /// Display name.
    pub name: String,
    /// Original name.
    pub original_name: Option<String>,
    /// Gender.
    pub gender: Gender,
    /// Known-for department.
    pub known_for_department: Option<String>,
    /// Profile image path.
    pub profile_path: Option<String>,
    /// Adult flag.
    pub adult: bool,
    /// Popularity score.
    pub popularity: f64,
}

impl Keyed for PersonRecord {
    type Key = u64;
    const ENTITY: &'static str = "person";
    const TABLE: &'static str = "people";
    const KEY_COLUMN: &'static str = "tmdb_id";
}

impl Upsert for PersonRecord {
    /// `(name, profile_path, known_for_department, popularity)`.
    type Snapshot = (String, Option<String>, Option<String>, f64);
    const COLUMNS: &'static [&'static str] = &[
        "tmdb_id",
        "name",
        "original_name",
        "gender",
        "known_for_department",
        "profile_path",
        "adult",
        "popularity",
    ];
    const REFRESHABLE: &'static [&'static str] =
        &["name", "profile_path", "known_for_department", "popularity"];

    fn key(&self) -> u64 {
        self.tmdb_id
    }

    fn snapshot(&self) -> Self::Snapshot {
        (
            self.name.clone(),
            self.profile_path.clone(),
            self.known_for_department.clone(),
            self.popularity,
        )
    }

    fn read_snapshot(row: &Row<'_>) -> rusqlite::Result<Self::Snapshot> {
        Ok((row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
    }

    fn insert_values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.tmdb_id,
            &self.name,
            &self.original_name,
            &self.gender,
            &self.known_for_department,
            &self.profile_path,
            &self.adult,
            &self.popularity,
        ]
    }

    fn refresh_values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.name,
            &self.profile_path,
            &self.known_for_department,
            &self.popularity,
        ]
    }
}
