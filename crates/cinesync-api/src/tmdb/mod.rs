//! TMDB API client module.
//!
//! Handles rate-limited requests to the TMDB API v3 endpoints used by the
//! catalog ingestion: movie listings, genres, streaming platforms and the
//! per-movie availability, images, videos, credits and details resources.

mod api;
mod client;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{LocalTmdbApi, TmdbApi};
#[allow(clippy::module_name_repetitions)]
pub use client::{TmdbClient, TmdbClientBuilder};
#[allow(clippy::module_name_repetitions)]
pub use types::{
    SearchMovieParams, TmdbCastMember, TmdbCompany, TmdbCredits, TmdbCrewMember,
    TmdbErrorResponse, TmdbGenre, TmdbGenreList, TmdbImage, TmdbImages, TmdbMovieDetails,
    TmdbMovieSummary, TmdbPage, TmdbProvider, TmdbProviderList, TmdbRegionProviders, TmdbVideo,
    TmdbVideos, TmdbWatchProviders,
};
