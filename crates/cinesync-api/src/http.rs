//! Rate-limited JSON GET shared by the provider clients.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::rate_limiter::RateLimiter;
use crate::resource::ResourceKind;

/// Extracts a human-readable message from a provider error body.
pub(crate) type ErrorBodyParser = fn(&str) -> Option<String>;

/// HTTP client, rate limiter and cancellation token of one provider.
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    /// HTTP client.
    client: Client,
    /// Provider rate limiter, shared with every clone of the client.
    limiter: Arc<RateLimiter>,
    /// Cancels rate-limit waits and in-flight requests.
    cancel: CancellationToken,
}

impl HttpTransport {
    /// Creates a transport.
    pub(crate) const fn new(
        client: Client,
        limiter: Arc<RateLimiter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            limiter,
            cancel,
        }
    }

    /// Starts a GET request on the underlying client.
    pub(crate) fn get(&self, url: url::Url) -> RequestBuilder {
        self.client.get(url)
    }

    /// Rate limiter gating this transport.
    pub(crate) const fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Takes a rate-limit slot, sends `request` and decodes the JSON body.
    ///
    /// Exactly one attempt is made; retrying is the caller's decision.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        resource: ResourceKind,
        params: String,
        request: RequestBuilder,
        error_body: ErrorBodyParser,
    ) -> Result<T, FetchError> {
        if self.limiter.acquire(&self.cancel).await.is_err() {
            return Err(FetchError::Interrupted { resource, params });
        }

        let request = match request.build() {
            Ok(request) => request,
            Err(e) => {
                return Err(FetchError::InvalidRequest {
                    resource,
                    params,
                    message: e.to_string(),
                });
            }
        };
        tracing::debug!(url = %request.url(), %resource, "API request");

        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                return Err(FetchError::Interrupted { resource, params });
            }
            sent = self.client.execute(request) => match sent {
                Ok(response) => response,
                Err(source) => return Err(FetchError::Transport { resource, params, source }),
            },
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(source) => {
                return Err(FetchError::Transport {
                    resource,
                    params,
                    source,
                });
            }
        };

        if !status.is_success() {
            let message = error_body(&body).unwrap_or(body);
            return Err(FetchError::Status {
                resource,
                params,
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            resource,
            params,
            source,
        })
    }
}

/// Renders `path?k=v&...` for error context.
pub(crate) fn describe_params(path: &str, query: &[(&str, String)]) -> String {
    if query.is_empty() {
        return String::from(path);
    }
    let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{path}?{}", pairs.join("&"))
}
