//! `TmdbApi` trait definition.
#![allow(clippy::future_not_send)]

use super::types::{
    SearchMovieParams, TmdbCredits, TmdbGenreList, TmdbImages, TmdbMovieDetails, TmdbPage,
    TmdbProviderList, TmdbVideos, TmdbWatchProviders,
};
use crate::error::FetchError;
use crate::resource::MovieList;

/// TMDB API trait.
///
/// Abstracts API operations for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait; the
/// ingestion worker pool requires the `Send` variant because fetches run on
/// spawned tasks.
///
/// Every method performs exactly one rate-limited request and never
/// retries.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(TmdbApi: Send)]
pub trait LocalTmdbApi {
    /// Fetches one page of a movie listing.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request, status or decoding fails.
    async fn movie_list(&self, list: MovieList, page: u32) -> Result<TmdbPage, FetchError>;

    /// Fetches the movie genre list.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request, status or decoding fails.
    async fn movie_genres(&self) -> Result<TmdbGenreList, FetchError>;

    /// Fetches the TV genre list.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request, status or decoding fails.
    async fn tv_genres(&self) -> Result<TmdbGenreList, FetchError>;

    /// Fetches the streaming platforms available in the configured region.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request, status or decoding fails.
    async fn watch_provider_list(&self) -> Result<TmdbProviderList, FetchError>;

    /// Fetches per-region streaming availability of a movie.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request, status or decoding fails.
    async fn movie_watch_providers(&self, movie_id: u64) -> Result<TmdbWatchProviders, FetchError>;

    /// Fetches the images of a movie.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request, status or decoding fails.
    async fn movie_images(&self, movie_id: u64) -> Result<TmdbImages, FetchError>;

    /// Fetches the videos of a movie.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request, status or decoding fails.
    async fn movie_videos(&self, movie_id: u64) -> Result<TmdbVideos, FetchError>;

    /// Fetches the cast and crew of a movie.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request, status or decoding fails.
    async fn movie_credits(&self, movie_id: u64) -> Result<TmdbCredits, FetchError>;

    /// Fetches the detail record of a movie.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request, status or decoding fails.
    async fn movie_details(&self, movie_id: u64) -> Result<TmdbMovieDetails, FetchError>;

    /// Searches for movies.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request, status or decoding fails.
    async fn search_movie(&self, params: &SearchMovieParams) -> Result<TmdbPage, FetchError>;
}
