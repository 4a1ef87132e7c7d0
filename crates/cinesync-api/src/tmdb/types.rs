//! TMDB API response types and request parameters.
//!
//! Envelopes keep their list entries as [`RawItem`] so one malformed entry
//! can be dropped by the caller without failing the whole response; the
//! `Tmdb*` item structs are the shapes those entries decode into.

use std::collections::HashMap;

use serde::Deserialize;

use crate::RawItem;

// --- Envelopes ---

/// One page of a movie listing (`discover/movie`, `movie/popular`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPage {
    /// Current page number.
    pub page: u32,
    /// Page entries.
    #[serde(default)]
    pub results: Vec<RawItem>,
    /// Total number of pages.
    #[serde(default)]
    pub total_pages: u32,
    /// Total number of results.
    #[serde(default)]
    pub total_results: u32,
}

/// Response from `genre/movie/list` and `genre/tv/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenreList {
    /// Genre entries.
    #[serde(default)]
    pub genres: Vec<RawItem>,
}

/// Response from `watch/providers/movie`.
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbProviderList {
    /// Provider entries.
    #[serde(default)]
    pub results: Vec<RawItem>,
}

/// Response from `movie/{id}/watch/providers`.
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbWatchProviders {
    /// TMDB movie ID.
    pub id: u64,
    /// Region code (ISO 3166-1) to region entry.
    #[serde(default)]
    pub results: HashMap<String, RawItem>,
}

/// Response from `movie/{id}/images`.
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbImages {
    /// TMDB movie ID.
    pub id: u64,
    /// Backdrop entries.
    #[serde(default)]
    pub backdrops: Vec<RawItem>,
    /// Logo entries.
    #[serde(default)]
    pub logos: Vec<RawItem>,
    /// Poster entries.
    #[serde(default)]
    pub posters: Vec<RawItem>,
}

/// Response from `movie/{id}/videos`.
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbVideos {
    /// TMDB movie ID.
    pub id: u64,
    /// Video entries.
    #[serde(default)]
    pub results: Vec<RawItem>,
}

/// Response from `movie/{id}/credits`.
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCredits {
    /// TMDB movie ID.
    pub id: u64,
    /// Cast entries.
    #[serde(default)]
    pub cast: Vec<RawItem>,
    /// Crew entries.
    #[serde(default)]
    pub crew: Vec<RawItem>,
}

/// Response from `movie/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieDetails {
    /// TMDB movie ID.
    pub id: u64,
    /// Runtime in minutes.
    pub runtime: Option<u32>,
    /// Release status (`Released`, `Post Production`, ...).
    pub status: Option<String>,
    /// Production company entries.
    #[serde(default)]
    pub production_companies: Vec<RawItem>,
}

/// Error response body.
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbErrorResponse {
    /// TMDB error code.
    pub status_code: u32,
    /// Error message.
    pub status_message: String,
    /// Success flag (always false for errors).
    #[serde(default)]
    pub success: bool,
}

// --- Entries ---

/// A movie entry of a listing page or search result.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TmdbMovieSummary {
    /// TMDB movie ID.
    pub id: u64,
    /// Localized title.
    pub title: String,
    /// Original title.
    pub original_title: Option<String>,
    /// Original language (ISO 639-1).
    pub original_language: Option<String>,
    /// Overview text.
    pub overview: Option<String>,
    /// Release date (YYYY-MM-DD, may be empty).
    pub release_date: Option<String>,
    /// Adult flag.
    #[serde(default)]
    pub adult: bool,
    /// Video flag.
    #[serde(default)]
    pub video: bool,
    /// Popularity score.
    #[serde(default)]
    pub popularity: f64,
    /// Vote average.
    #[serde(default)]
    pub vote_average: f64,
    /// Vote count.
    #[serde(default)]
    pub vote_count: u32,
    /// Genre IDs.
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    /// Poster image path.
    pub poster_path: Option<String>,
    /// Backdrop image path.
    pub backdrop_path: Option<String>,
}

/// A genre entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TmdbGenre {
    /// TMDB genre ID.
    pub id: u32,
    /// Localized name.
    pub name: String,
}

/// A streaming platform entry (provider list or per-movie availability).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TmdbProvider {
    /// TMDB provider ID.
    pub provider_id: u32,
    /// Provider name.
    pub provider_name: String,
    /// Logo image path.
    pub logo_path: Option<String>,
    /// Display priority.
    pub display_priority: Option<i64>,
}

/// Availability of one movie in one region.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TmdbRegionProviders {
    /// Subscription providers.
    #[serde(default)]
    pub flatrate: Vec<RawItem>,
    /// Purchase providers.
    #[serde(default)]
    pub buy: Vec<RawItem>,
    /// Rental providers.
    #[serde(default)]
    pub rent: Vec<RawItem>,
}

/// A cast entry of `movie/{id}/credits`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TmdbCastMember {
    /// TMDB person ID.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Original name.
    pub original_name: Option<String>,
    /// Gender code (0 unknown, 1 female, 2 male, 3 non-binary).
    pub gender: Option<u8>,
    /// Known-for department.
    pub known_for_department: Option<String>,
    /// Profile image path.
    pub profile_path: Option<String>,
    /// Adult flag.
    #[serde(default)]
    pub adult: bool,
    /// Popularity score.
    #[serde(default)]
    pub popularity: f64,
    /// Character name.
    pub character: Option<String>,
    /// Unique credit ID.
    pub credit_id: String,
    /// Billing order.
    pub order: Option<u32>,
}

/// A crew entry of `movie/{id}/credits`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TmdbCrewMember {
    /// TMDB person ID.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Original name.
    pub original_name: Option<String>,
    /// Gender code (0 unknown, 1 female, 2 male, 3 non-binary).
    pub gender: Option<u8>,
    /// Known-for department.
    pub known_for_department: Option<String>,
    /// Profile image path.
    pub profile_path: Option<String>,
    /// Adult flag.
    #[serde(default)]
    pub adult: bool,
    /// Popularity score.
    #[serde(default)]
    pub popularity: f64,
    /// Unique credit ID.
    pub credit_id: String,
    /// Department.
    pub department: Option<String>,
    /// Job title.
    pub job: Option<String>,
}

/// An image entry of `movie/{id}/images`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TmdbImage {
    /// Image path.
    pub file_path: String,
    /// Width in pixels.
    #[serde(default)]
    pub width: u32,
    /// Height in pixels.
    #[serde(default)]
    pub height: u32,
    /// Aspect ratio.
    #[serde(default)]
    pub aspect_ratio: f64,
    /// Language (ISO 639-1).
    pub iso_639_1: Option<String>,
}

/// A video entry of `movie/{id}/videos`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TmdbVideo {
    /// TMDB video ID.
    pub id: String,
    /// Site-specific key.
    pub key: String,
    /// Title.
    pub name: Option<String>,
    /// Hosting site (`YouTube`, `Vimeo`, ...).
    pub site: Option<String>,
    /// Video type (`Trailer`, `Teaser`, ...).
    #[serde(rename = "type")]
    pub video_type: Option<String>,
    /// Language (ISO 639-1).
    pub iso_639_1: Option<String>,
    /// Official flag.
    #[serde(default)]
    pub official: bool,
}

/// A production company entry of `movie/{id}`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TmdbCompany {
    /// TMDB company ID.
    pub id: u64,
    /// Company name.
    pub name: String,
    /// Origin country (ISO 3166-1).
    pub origin_country: Option<String>,
    /// Logo image path.
    pub logo_path: Option<String>,
}

// --- Request Parameters ---

/// Parameters for `search/movie`.
#[derive(Debug, Clone)]
pub struct SearchMovieParams {
    /// Search query (required).
    pub query: String,
    /// Response language (default: "ko-KR").
    pub language: String,
    /// Result page (1-500, default: 1).
    pub page: u32,
    /// Filter by primary release year.
    pub primary_release_year: Option<u32>,
    /// Filter by year.
    pub year: Option<u32>,
    /// Region filter (ISO 3166-1).
    pub region: Option<String>,
    /// Include adult content.
    pub include_adult: bool,
}

impl SearchMovieParams {
    /// Creates new search params with the given query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            language: String::from("ko-KR"),
            page: 1,
            primary_release_year: None,
            year: None,
            region: None,
            include_adult: false,
        }
    }

    /// Sets the response language.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Sets the year filter.
    #[must_use]
    pub const fn year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }

    /// Sets the region filter.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Query pairs sent to the API.
    pub(crate) fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query: Vec<(&'static str, String)> = vec![
            ("query", self.query.clone()),
            ("language", self.language.clone()),
            ("page", self.page.to_string()),
            ("include_adult", self.include_adult.to_string()),
        ];
        if let Some(year) = self.primary_release_year {
            query.push(("primary_release_year", year.to_string()));
        }
        if let Some(year) = self.year {
            query.push(("year", year.to_string()));
        }
        if let Some(ref region) = self.region {
            query.push(("region", region.clone()));
        }
        query
    }
}
