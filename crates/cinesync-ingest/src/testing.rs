//! In-memory provider doubles for stage tests.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use cinesync_api::kofic::{KoficApi, KoficBoxOffice};
use cinesync_api::tmdb::{
    SearchMovieParams, TmdbApi, TmdbCredits, TmdbGenreList, TmdbImages, TmdbMovieDetails,
    TmdbPage, TmdbProviderList, TmdbVideos, TmdbWatchProviders,
};
use cinesync_api::{FetchError, MovieList, RawItem, ResourceKind};
use serde_json::json;

/// A listing entry for movie `id` titled `movie {id}`.
pub fn movie_item(id: u64) -> RawItem {
    titled_movie_item(id, &format!("movie {id}"))
}

/// A listing entry for movie `id`.
pub fn titled_movie_item(id: u64, title: &str) -> RawItem {
    json!({
        "id": id,
        "title": title,
        "original_title": title,
        "release_date": "2020-01-01",
        "popularity": 10.0,
        "vote_average": 7.0,
        "vote_count": 100,
        "genre_ids": [18]
    })
}

fn not_found(resource: ResourceKind, params: String) -> FetchError {
    FetchError::Status {
        resource,
        params,
        status: 404,
        message: String::from("The resource you requested could not be found."),
    }
}

fn page(number: u32, total_pages: u32, results: Vec<RawItem>) -> TmdbPage {
    TmdbPage {
        page: number,
        total_results: u32::try_from(results.len()).unwrap_or(u32::MAX),
        results,
        total_pages,
    }
}

/// A TMDB double serving a small synthetic catalog.
#[derive(Debug, Default)]
pub struct FakeTmdb {
    /// Listing pages; page `n` is `pages[n - 1]`.
    pub pages: Vec<Vec<RawItem>>,
    /// Listing pages answering 404.
    pub missing_pages: Vec<u32>,
    /// Movies whose images answer 404.
    pub missing_images: Vec<u64>,
    /// Whether the genre lists answer 401.
    pub genres_down: bool,
    /// Search results by query.
    pub search_results: HashMap<String, Vec<RawItem>>,
    /// Queries received by `search_movie`.
    pub searches: Mutex<Vec<String>>,
}

impl FakeTmdb {
    /// A catalog whose single listing page holds `ids`.
    pub fn with_movies(ids: &[u64]) -> Self {
        Self {
            pages: vec![ids.iter().copied().map(movie_item).collect()],
            ..Self::default()
        }
    }
}

impl TmdbApi for FakeTmdb {
    async fn movie_list(&self, list: MovieList, page_number: u32) -> Result<TmdbPage, FetchError> {
        let params = format!("{}?page={page_number}", list.path());
        if self.missing_pages.contains(&page_number) {
            return Err(not_found(ResourceKind::MovieList(list), params));
        }
        let total_pages = u32::try_from(self.pages.len()).unwrap_or(u32::MAX);
        let results = usize::try_from(page_number)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| self.pages.get(index))
            .cloned()
            .unwrap_or_default();
        Ok(page(page_number, total_pages, results))
    }

    async fn movie_genres(&self) -> Result<TmdbGenreList, FetchError> {
        if self.genres_down {
            return Err(FetchError::Status {
                resource: ResourceKind::MovieGenres,
                params: String::from("genre/movie/list"),
                status: 401,
                message: String::from("Invalid API key"),
            });
        }
        Ok(TmdbGenreList {
            genres: vec![
                json!({ "id": 28, "name": "액션" }),
                json!({ "id": 18, "name": "드라마" }),
            ],
        })
    }

    async fn tv_genres(&self) -> Result<TmdbGenreList, FetchError> {
        Ok(TmdbGenreList {
            genres: vec![json!({ "id": 18, "name": "드라마" })],
        })
    }

    async fn watch_provider_list(&self) -> Result<TmdbProviderList, FetchError> {
        Ok(TmdbProviderList {
            results: vec![json!({
                "provider_id": 8,
                "provider_name": "Netflix",
                "logo_path": "/netflix.jpg",
                "display_priority": 0
            })],
        })
    }

    async fn movie_watch_providers(&self, movie_id: u64) -> Result<TmdbWatchProviders, FetchError> {
        let region = json!({
            "flatrate": [{ "provider_id": 8, "provider_name": "Netflix" }],
            "buy": [{ "provider_id": 8, "provider_name": "Netflix" }]
        });
        Ok(TmdbWatchProviders {
            id: movie_id,
            results: HashMap::from([(String::from("KR"), region)]),
        })
    }

    async fn movie_images(&self, movie_id: u64) -> Result<TmdbImages, FetchError> {
        if self.missing_images.contains(&movie_id) {
            return Err(not_found(
                ResourceKind::MovieImages,
                format!("movie/{movie_id}/images"),
            ));
        }
        Ok(TmdbImages {
            id: movie_id,
            backdrops: Vec::new(),
            logos: Vec::new(),
            posters: vec![json!({
                "file_path": format!("/poster-{movie_id}.jpg"),
                "width": 1000,
                "height": 1500,
                "aspect_ratio": 0.667
            })],
        })
    }

    async fn movie_videos(&self, movie_id: u64) -> Result<TmdbVideos, FetchError> {
        Ok(TmdbVideos {
            id: movie_id,
            results: vec![json!({
                "id": format!("video-{movie_id}"),
                "key": format!("key{movie_id}"),
                "site": "YouTube",
                "type": "Trailer",
                "official": true
            })],
        })
    }

    async fn movie_credits(&self, movie_id: u64) -> Result<TmdbCredits, FetchError> {
        Ok(TmdbCredits {
            id: movie_id,
            cast: vec![json!({
                "id": 287,
                "name": "Brad Pitt",
                "gender": 2,
                "credit_id": format!("cast-{movie_id}"),
                "character": "Himself",
                "order": 0
            })],
            crew: Vec::new(),
        })
    }

    async fn movie_details(&self, movie_id: u64) -> Result<TmdbMovieDetails, FetchError> {
        Ok(TmdbMovieDetails {
            id: movie_id,
            runtime: Some(120),
            status: Some(String::from("Released")),
            production_companies: vec![json!({ "id": 508, "name": "Regency Enterprises" })],
        })
    }

    async fn search_movie(&self, params: &SearchMovieParams) -> Result<TmdbPage, FetchError> {
        if let Ok(mut searches) = self.searches.lock() {
            searches.push(params.query.clone());
        }
        let results = self
            .search_results
            .get(&params.query)
            .cloned()
            .unwrap_or_default();
        Ok(page(1, 1, results))
    }
}

/// A KOFIC double serving one ranking per date.
#[derive(Debug, Default)]
pub struct FakeKofic {
    /// Rankings by target date.
    pub days: HashMap<NaiveDate, KoficBoxOffice>,
}

impl KoficApi for FakeKofic {
    async fn daily_box_office(&self, target_date: NaiveDate) -> Result<KoficBoxOffice, FetchError> {
        self.days.get(&target_date).cloned().ok_or_else(|| FetchError::Fault {
            resource: ResourceKind::DailyBoxOffice,
            params: format!("targetDt={}", target_date.format("%Y%m%d")),
            message: String::from("no ranking for the date"),
        })
    }
}
