//! `KoficClient` - KOFIC box-office API client implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use url::Url;

use super::api::KoficApi;
use super::types::{KoficBoxOffice, KoficBoxOfficeResponse};
use crate::error::FetchError;
use crate::http::{HttpTransport, describe_params};
use crate::rate_limiter::RateLimiter;
use crate::resource::ResourceKind;

/// Default base URL of the KOFIC box-office service.
const DEFAULT_BASE_URL: &str = "https://www.kobis.or.kr/kobisopenapi/webservice/rest/boxoffice/";

/// Daily ranking endpoint.
const DAILY_PATH: &str = "searchDailyBoxOfficeList.json";

/// Default ceiling (10 calls per second).
const DEFAULT_CAPACITY: usize = 10;

/// Default window.
const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// KOFIC API client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct KoficClient {
    /// Rate-limited HTTP transport.
    transport: HttpTransport,
    /// Base URL for API requests.
    base_url: Url,
    /// API key (sent as the `key` query parameter).
    api_key: String,
}

/// Builder for `KoficClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct KoficClientBuilder {
    base_url: Option<Url>,
    api_key: Option<String>,
    user_agent: Option<String>,
    rate_limiter: Option<Arc<RateLimiter>>,
    cancel: Option<CancellationToken>,
}

impl KoficClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            base_url: None,
            api_key: None,
            user_agent: None,
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

    /// Sets the API key (required).
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Shares a rate limiter (default: 10 calls per second).
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
    /// - `api_key` is not set.
    /// - `user_agent` is not set.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<KoficClient> {
        let api_key = self.api_key.context("api_key is required")?;
        let user_agent = self.user_agent.context("user_agent is required")?;

        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL).context("invalid default base URL")?,
        };

        let rate_limiter = self.rate_limiter.unwrap_or_else(|| {
            Arc::new(RateLimiter::new("kofic", DEFAULT_CAPACITY, DEFAULT_WINDOW))
        });

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .gzip(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(KoficClient {
            transport: HttpTransport::new(
                http_client,
                rate_limiter,
                self.cancel.unwrap_or_default(),
            ),
            base_url,
            api_key,
        })
    }
}

impl KoficClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> KoficClientBuilder {
        KoficClientBuilder::new()
    }
}

impl KoficApi for KoficClient {
    #[instrument(skip_all, fields(target_date = %target_date))]
    async fn daily_box_office(&self, target_date: NaiveDate) -> Result<KoficBoxOffice, FetchError> {
        let resource = ResourceKind::DailyBoxOffice;
        let target_dt = target_date.format("%Y%m%d").to_string();
        // The key stays out of the params rendered into errors and logs.
        let params = describe_params(DAILY_PATH, &[("targetDt", target_dt.clone())]);

        let url = match self.base_url.join(DAILY_PATH) {
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
            .query(&[("key", self.api_key.as_str()), ("targetDt", target_dt.as_str())]);

        let response: KoficBoxOfficeResponse = self
            .transport
            .get_json(resource, params.clone(), request, |_| None)
            .await?;

        if let Some(fault) = response.fault_info {
            return Err(FetchError::Fault {
                resource,
                params,
                message: format!("{} ({})", fault.message, fault.error_code),
            });
        }

        response.box_office_result.ok_or_else(|| FetchError::Fault {
            resource,
            params,
            message: String::from("response has no boxOfficeResult"),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn client_for(mock_server: &wiremock::MockServer) -> KoficClient {
        let base_url = format!("{}/boxoffice/", mock_server.uri());
        KoficClient::builder()
            .base_url(base_url.parse().unwrap())
            .api_key("test-key")
            .user_agent("test/0.0.0")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_api_key() {
        // Arrange & Act
        let result = KoficClient::builder().user_agent("test/0.0.0").build();

        // Assert
        assert!(result.unwrap_err().to_string().contains("api_key is required"));
    }

    #[tokio::test]
    async fn test_daily_box_office_via_http() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/kofic/daily_box_office.json");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(
                "/boxoffice/searchDailyBoxOfficeList.json",
            ))
            .and(wiremock::matchers::query_param("key", "test-key"))
            .and(wiremock::matchers::query_param("targetDt", "20240101"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        // Act
        let result = client.daily_box_office(date).await.unwrap();

        // Assert
        assert_eq!(result.daily_box_office_list.len(), 3);
        assert_eq!(result.show_range.as_deref(), Some("20240101~20240101"));
    }

    #[tokio::test]
    async fn test_fault_document_becomes_fault_error() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let body = r#"{"faultInfo":{"message":"유효하지않은 키값입니다.","errorCode":"320010"}}"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        // Act
        let err = client.daily_box_office(date).await.unwrap_err();

        // Assert
        assert!(matches!(err, FetchError::Fault { .. }));
        let message = err.to_string();
        assert!(message.contains("320010"));
        assert!(!message.contains("test-key"));
    }
}
