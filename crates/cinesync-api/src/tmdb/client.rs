//! `TmdbClient` - TMDB API client implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use url::Url;

use super::api::TmdbApi;
use super::types::{
    SearchMovieParams, TmdbCredits, TmdbErrorResponse, TmdbGenreList, TmdbImages,
    TmdbMovieDetails, TmdbPage, TmdbProviderList, TmdbVideos, TmdbWatchProviders,
};
use crate::error::FetchError;
use crate::http::{HttpTransport, describe_params};
use crate::rate_limiter::RateLimiter;
use crate::resource::{MovieList, ResourceKind};

/// Default base URL for TMDB API v3.
const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3/";

/// Default response language.
const DEFAULT_LANGUAGE: &str = "ko-KR";

/// Default availability region.
const DEFAULT_REGION: &str = "KR";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// TMDB API client.
///
/// Cheap to share behind an `Arc`; every request takes a slot from the
/// injected [`RateLimiter`].
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct TmdbClient {
    /// Rate-limited HTTP transport.
    transport: HttpTransport,
    /// Base URL for API requests.
    base_url: Url,
    /// Bearer API token.
    api_token: String,
    /// Response language (e.g. `ko-KR`).
    language: String,
    /// Availability region (ISO 3166-1).
    region: String,
}

/// Builder for `TmdbClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct TmdbClientBuilder {
    base_url: Option<Url>,
    api_token: Option<String>,
    user_agent: Option<String>,
    language: Option<String>,
    region: Option<String>,
    rate_limiter: Option<Arc<RateLimiter>>,
    cancel: Option<CancellationToken>,
}

impl TmdbClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            base_url: None,
            api_token: None,
            user_agent: None,
            language: None,
            region: None,
            rate_limiter: None,
            cancel: None,
        }
    }

    /// Overrides the base URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the API bearer token (required).
    #[must_use]
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the response language (default: `ko-KR`).
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the availability region (default: `KR`).
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Shares a rate limiter (default: 40 calls per 10 seconds).
    #[must_use]
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Sets the token that cancels rate-limit waits and in-flight requests.
    #[must_use]
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `api_token` is not set.
    /// - `user_agent` is not set.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<TmdbClient> {
        let api_token = self.api_token.context("api_token is required")?;
        let user_agent = self.user_agent.context("user_agent is required")?;

        let base_url = if let Some(url) = self.base_url {
            url
        } else {
            let result = Url::parse(DEFAULT_BASE_URL);
            result.context("invalid default base URL")?
        };

        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::tmdb_default()));

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .gzip(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(TmdbClient {
            transport: HttpTransport::new(
                http_client,
                rate_limiter,
                self.cancel.unwrap_or_default(),
            ),
            base_url,
            api_token,
            language: self.language.unwrap_or_else(|| String::from(DEFAULT_LANGUAGE)),
            region: self.region.unwrap_or_else(|| String::from(DEFAULT_REGION)),
        })
    }
}

/// Extracts `status_message` from a TMDB error body.
fn tmdb_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<TmdbErrorResponse>(body)
        .ok()
        .map(|e| format!("code={}, message={}", e.status_code, e.status_message))
}

impl TmdbClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> TmdbClientBuilder {
        TmdbClientBuilder::new()
    }

    /// Availability region used for provider lookups.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Rate limiter gating this client.
    #[must_use]
    pub const fn rate_limiter(&self) -> &Arc<RateLimiter> {
        self.transport.limiter()
    }

    /// Sends a rate-limited GET request with Bearer auth and query params.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        resource: ResourceKind,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let params = describe_params(path, query);
        let url = match self.base_url.join(path) {
            Ok(url) => url,
            Err(e) => {
                return Err(FetchError::InvalidRequest {
                    resource,
                    params,
                    message: format!("failed to join URL path: {e}"),
                });
            }
        };

        let request = self
            .transport
            .get(url)
            .bearer_auth(&self.api_token)
            .query(query);

        self.transport
            .get_json(resource, params, request, tmdb_error_message)
            .await
    }

    /// Query pair carrying the configured language.
    fn language_query(&self) -> [(&'static str, String); 1] {
        [("language", self.language.clone())]
    }
}

impl TmdbApi for TmdbClient {
    #[instrument(skip_all, fields(list = list.name(), page = page))]
    async fn movie_list(&self, list: MovieList, page: u32) -> Result<TmdbPage, FetchError> {
        let mut query: Vec<(&str, String)> = vec![
            ("page", page.to_string()),
            ("language", self.language.clone()),
        ];
        if list.accepts_region() {
            query.push(("region", self.region.clone()));
        }
        self.get_json(ResourceKind::MovieList(list), list.path(), &query)
            .await
    }

    #[instrument(skip_all)]
    async fn movie_genres(&self) -> Result<TmdbGenreList, FetchError> {
        self.get_json(
            ResourceKind::MovieGenres,
            "genre/movie/list",
            &self.language_query(),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn tv_genres(&self) -> Result<TmdbGenreList, FetchError> {
        self.get_json(ResourceKind::TvGenres, "genre/tv/list", &self.language_query())
            .await
    }

    #[instrument(skip_all)]
    async fn watch_provider_list(&self) -> Result<TmdbProviderList, FetchError> {
        let query = [
            ("language", self.language.clone()),
            ("watch_region", self.region.clone()),
        ];
        self.get_json(
            ResourceKind::WatchProviderList,
            "watch/providers/movie",
            &query,
        )
        .await
    }

    #[instrument(skip_all, fields(movie_id = movie_id))]
    async fn movie_watch_providers(&self, movie_id: u64) -> Result<TmdbWatchProviders, FetchError> {
        let path = format!("movie/{movie_id}/watch/providers");
        self.get_json(ResourceKind::MovieWatchProviders, &path, &[])
            .await
    }

    #[instrument(skip_all, fields(movie_id = movie_id))]
    async fn movie_images(&self, movie_id: u64) -> Result<TmdbImages, FetchError> {
        let path = format!("movie/{movie_id}/images");
        self.get_json(ResourceKind::MovieImages, &path, &[]).await
    }

    #[instrument(skip_all, fields(movie_id = movie_id))]
    async fn movie_videos(&self, movie_id: u64) -> Result<TmdbVideos, FetchError> {
        let path = format!("movie/{movie_id}/videos");
        self.get_json(ResourceKind::MovieVideos, &path, &[]).await
    }

    #[instrument(skip_all, fields(movie_id = movie_id))]
    async fn movie_credits(&self, movie_id: u64) -> Result<TmdbCredits, FetchError> {
        let path = format!("movie/{movie_id}/credits");
        self.get_json(ResourceKind::MovieCredits, &path, &self.language_query())
            .await
    }

    #[instrument(skip_all, fields(movie_id = movie_id))]
    async fn movie_details(&self, movie_id: u64) -> Result<TmdbMovieDetails, FetchError> {
        let path = format!("movie/{movie_id}");
        self.get_json(ResourceKind::MovieDetails, &path, &self.language_query())
            .await
    }

    #[instrument(skip_all)]
    async fn search_movie(&self, params: &SearchMovieParams) -> Result<TmdbPage, FetchError> {
        self.get_json(ResourceKind::SearchMovie, "search/movie", &params.to_query())
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use crate::tmdb::types::{TmdbCastMember, TmdbImage, TmdbMovieSummary, TmdbVideo};

    fn client_for(mock_server: &wiremock::MockServer) -> TmdbClient {
        let base_url = format!("{}/3/", mock_server.uri());
        TmdbClient::builder()
            .base_url(base_url.parse().unwrap())
            .api_token("test-token")
            .user_agent("test/0.0.0")
            .rate_limiter(Arc::new(RateLimiter::new(
                "test",
                100,
                Duration::from_secs(1),
            )))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_api_token() {
        // Arrange & Act
        let result = TmdbClient::builder().user_agent("test/0.0.0").build();

        // Assert
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("api_token is required")
        );
    }

    #[test]
    fn test_builder_requires_user_agent() {
        // Arrange & Act
        let result = TmdbClient::builder().api_token("test-token").build();

        // Assert
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("user_agent is required")
        );
    }

    #[test]
    fn test_builder_defaults() {
        // Arrange & Act
        let client = TmdbClient::builder()
            .api_token("test-token")
            .user_agent("test/0.0.0")
            .build()
            .unwrap();

        // Assert
        assert_eq!(client.language, "ko-KR");
        assert_eq!(client.region(), "KR");
        assert_eq!(client.rate_limiter().capacity(), 40);
        assert_eq!(client.base_url.as_str(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_describe_params() {
        // Arrange
        let query = [("page", String::from("2")), ("language", String::from("ko-KR"))];

        // Act
        let described = describe_params("discover/movie", &query);

        // Assert
        assert_eq!(described, "discover/movie?page=2&language=ko-KR");
        assert_eq!(describe_params("movie/1/images", &[]), "movie/1/images");
    }

    #[test]
    fn test_parse_discover_fixture() {
        // Arrange
        let json = include_str!("../../../../fixtures/tmdb/discover_page1.json");

        // Act
        let page: TmdbPage = serde_json::from_str(json).unwrap();
        let first: TmdbMovieSummary = serde_json::from_value(page.results[0].clone()).unwrap();

        // Assert
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 512);
        assert_eq!(page.results.len(), 2);
        assert_eq!(first.id, 496_243);
        assert_eq!(first.genre_ids, vec![35, 53, 18]);
    }

    #[test]
    fn test_parse_credits_fixture() {
        // Arrange
        let json = include_str!("../../../../fixtures/tmdb/credits_550.json");

        // Act
        let credits: TmdbCredits = serde_json::from_str(json).unwrap();
        let narrator: TmdbCastMember = serde_json::from_value(credits.cast[0].clone()).unwrap();

        // Assert
        assert_eq!(credits.id, 550);
        assert_eq!(credits.crew.len(), 2);
        assert_eq!(narrator.character.as_deref(), Some("The Narrator"));
        assert_eq!(narrator.order, Some(0));
    }

    #[test]
    fn test_parse_images_fixture_keeps_malformed_entry_raw() {
        // Arrange
        let json = include_str!("../../../../fixtures/tmdb/images_550.json");

        // Act
        let images: TmdbImages = serde_json::from_str(json).unwrap();
        let broken = serde_json::from_value::<TmdbImage>(images.posters[1].clone());

        // Assert
        assert_eq!(images.posters.len(), 2);
        assert!(broken.is_err());
    }

    #[test]
    fn test_parse_videos_fixture() {
        // Arrange
        let json = include_str!("../../../../fixtures/tmdb/videos_550.json");

        // Act
        let videos: TmdbVideos = serde_json::from_str(json).unwrap();
        let trailer: TmdbVideo = serde_json::from_value(videos.results[0].clone()).unwrap();

        // Assert
        assert_eq!(trailer.video_type.as_deref(), Some("Trailer"));
        assert_eq!(trailer.site.as_deref(), Some("YouTube"));
        assert!(trailer.official);
    }

    #[test]
    fn test_parse_error_response() {
        // Arrange
        let json = r#"{"status_code":7,"status_message":"Invalid API key: You must be granted a valid key.","success":false}"#;

        // Act
        let message = tmdb_error_message(json).unwrap();

        // Assert
        assert!(message.contains("code=7"));
        assert!(message.contains("Invalid API key"));
        assert!(tmdb_error_message("<html>").is_none());
    }

    #[tokio::test]
    async fn test_movie_list_discover_via_http() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/tmdb/discover_page1.json");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/3/discover/movie"))
            .and(wiremock::matchers::query_param("page", "1"))
            .and(wiremock::matchers::query_param("language", "ko-KR"))
            .and(wiremock::matchers::header_exists("Authorization"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let page = client.movie_list(MovieList::Discover, 1).await.unwrap();

        // Assert
        assert_eq!(page.results.len(), 2);
        assert_eq!(client.rate_limiter().total_calls(), 1);
    }

    #[tokio::test]
    async fn test_movie_list_upcoming_sends_region() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/tmdb/discover_page1.json");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/3/movie/upcoming"))
            .and(wiremock::matchers::query_param("region", "KR"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act & Assert (mock expect(1) verifies the region param)
        client.movie_list(MovieList::Upcoming, 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_movie_credits_via_http() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/tmdb/credits_550.json");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/3/movie/550/credits"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(json_body))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let credits = client.movie_credits(550).await.unwrap();

        // Assert
        assert_eq!(credits.id, 550);
        assert_eq!(credits.cast.len(), 3);
    }

    #[tokio::test]
    async fn test_watch_provider_list_sends_watch_region() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/tmdb/provider_list.json");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/3/watch/providers/movie"))
            .and(wiremock::matchers::query_param("watch_region", "KR"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let providers = client.watch_provider_list().await.unwrap();

        // Assert
        assert_eq!(providers.results.len(), 3);
    }

    #[tokio::test]
    async fn test_search_movie_via_http() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/tmdb/search_movie_parasite.json");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/3/search/movie"))
            .and(wiremock::matchers::query_param("query", "기생충"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let params = SearchMovieParams::new("기생충");

        // Act
        let page = client.search_movie(&params).await.unwrap();

        // Assert
        assert_eq!(page.total_results, 1);
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/tmdb/genre_movie_list.json");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::header(
                "Authorization",
                "Bearer my-secret-token",
            ))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let base_url = format!("{}/3/", mock_server.uri());
        let client = TmdbClient::builder()
            .base_url(base_url.parse().unwrap())
            .api_token("my-secret-token")
            .user_agent("test/0.0.0")
            .build()
            .unwrap();

        // Act & Assert (mock expect(1) verifies Authorization header)
        client.movie_genres().await.unwrap();
    }

    #[tokio::test]
    async fn test_http_error_returns_status_error() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let error_body = r#"{"status_code":7,"status_message":"Invalid API key: You must be granted a valid key.","success":false}"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(401).set_body_string(error_body))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let err = client.movie_images(550).await.unwrap_err();

        // Assert
        assert!(matches!(err, FetchError::Status { status: 401, .. }));
        assert!(!err.is_retryable());
        assert_eq!(err.resource(), ResourceKind::MovieImages);
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[tokio::test]
    async fn test_http_429_is_not_retried_by_client() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let error_body = r#"{"status_code":25,"status_message":"Your request count is over the allowed limit.","success":false}"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(429).set_body_string(error_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let err = client.movie_videos(550).await.unwrap_err();

        // Assert
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_body_returns_decode_error() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("{\"id\":"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let err = client.movie_details(550).await.unwrap_err();

        // Assert
        assert!(matches!(err, FetchError::Decode { .. }));
        assert!(err.to_string().contains("movie/550"));
    }

    #[tokio::test]
    async fn test_cancelled_token_interrupts_before_request() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("{}"))
            .expect(0)
            .mount(&mock_server)
            .await;

        let cancel = CancellationToken::new();
        let base_url = format!("{}/3/", mock_server.uri());
        let client = TmdbClient::builder()
            .base_url(base_url.parse().unwrap())
            .api_token("test-token")
            .user_agent("test/0.0.0")
            .cancel_token(cancel.clone())
            .build()
            .unwrap();
        cancel.cancel();

        // Act
        let err = client.movie_credits(550).await.unwrap_err();

        // Assert
        assert!(err.is_interrupted());
    }
}
