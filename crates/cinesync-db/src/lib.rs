//! Catalog store for cinesync.
//!
//! Uses `rusqlite` (bundled `SQLite`) to hold the movie catalog ingested
//! from TMDB and KOFIC. Every entity table carries a unique external key;
//! writes go through the insert-or-update driver in [`upsert`] so re-running
//! any batch is safe.

/// Catalog read queries.
pub mod catalog;
mod connection;
/// Cast and crew credits.
pub mod credits;
/// Movie detail refresh and production companies.
pub mod details;
mod error;
/// Genres.
pub mod genres;
/// Referential-integrity scan.
pub mod integrity;
/// KOFIC box office.
pub mod kofic;
/// Movie relationship rows.
pub mod links;
/// Images and videos.
pub mod media;
mod migrations;
/// Movies.
pub mod movies;
/// People.
pub mod people;
/// Platforms and availability.
pub mod platforms;
/// Insert-or-update driver.
pub mod upsert;

pub use catalog::{
    StoredMovie, count_movies, find_movie_id, find_movies_by_title, list_movie_tmdb_ids,
    table_counts,
};
pub use connection::{open_db, open_memory_db};
pub use credits::{CastRecord, CreditBatch, CrewRecord, persist_credits};
pub use details::{CompanyRecord, DetailsRecord, persist_details};
pub use error::DependencyNotResolved;
pub use genres::{GenreRecord, persist_genres};
pub use integrity::{IntegrityReport, OrphanCount, check_integrity};
pub use kofic::{
    BoxOfficeRecord, KoficMovieRecord, UnmappedKoficMovie, load_unmapped_kofic_movies,
    persist_box_office, update_kofic_mapping,
};
pub use media::{ImageKind, ImageRecord, VideoRecord, persist_images, persist_videos};
pub use movies::{MovieRecord, persist_movies};
pub use people::{Gender, PersonRecord};
pub use platforms::{AvailabilityRecord, PlatformRecord, persist_availability, persist_platforms};
pub use upsert::{PersistOutcome, UpsertSummary};
