//! Fetch error taxonomy shared by every provider client.

use thiserror::Error;

use crate::resource::ResourceKind;

/// Failure of a single upstream fetch.
///
/// Every variant names the resource and the request parameters so the
/// caller can log the failing unit and decide whether to retry, skip, or
/// abort.
#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum FetchError {
    /// The request could not be sent or the connection failed.
    #[error("{resource} request failed ({params}): {source}")]
    Transport {
        /// Requested resource.
        resource: ResourceKind,
        /// Request parameters.
        params: String,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-success status.
    #[error("{resource} returned HTTP {status} ({params}): {message}")]
    Status {
        /// Requested resource.
        resource: ResourceKind,
        /// Request parameters.
        params: String,
        /// HTTP status code.
        status: u16,
        /// Provider error message or raw body.
        message: String,
    },

    /// The response body was not the expected document.
    #[error("failed to decode {resource} response ({params}): {source}")]
    Decode {
        /// Requested resource.
        resource: ResourceKind,
        /// Request parameters.
        params: String,
        /// JSON decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The provider reported an application-level fault in a success response.
    #[error("{resource} reported a fault ({params}): {message}")]
    Fault {
        /// Requested resource.
        resource: ResourceKind,
        /// Request parameters.
        params: String,
        /// Fault message.
        message: String,
    },

    /// A wait for a rate-limit slot or a retry backoff was cancelled.
    #[error("{resource} request cancelled while waiting ({params})")]
    Interrupted {
        /// Requested resource.
        resource: ResourceKind,
        /// Request parameters.
        params: String,
    },

    /// The request URL could not be built.
    #[error("invalid {resource} request ({params}): {message}")]
    InvalidRequest {
        /// Requested resource.
        resource: ResourceKind,
        /// Request parameters.
        params: String,
        /// Reason.
        message: String,
    },
}

impl FetchError {
    /// Resource the failed request targeted.
    #[must_use]
    pub const fn resource(&self) -> ResourceKind {
        match self {
            Self::Transport { resource, .. }
            | Self::Status { resource, .. }
            | Self::Decode { resource, .. }
            | Self::Fault { resource, .. }
            | Self::Interrupted { resource, .. }
            | Self::InvalidRequest { resource, .. } => *resource,
        }
    }

    /// Request parameters of the failed request.
    #[must_use]
    pub fn params(&self) -> &str {
        match self {
            Self::Transport { params, .. }
            | Self::Status { params, .. }
            | Self::Decode { params, .. }
            | Self::Fault { params, .. }
            | Self::Interrupted { params, .. }
            | Self::InvalidRequest { params, .. } => params,
        }
    }

    /// Turns the failure into a cancellation of the same request.
    #[must_use]
    pub fn into_interrupted(self) -> Self {
        match self {
            Self::Transport {
                resource, params, ..
            }
            | Self::Status {
                resource, params, ..
            }
            | Self::Decode {
                resource, params, ..
            }
            | Self::Fault {
                resource, params, ..
            }
            | Self::Interrupted { resource, params }
            | Self::InvalidRequest {
                resource, params, ..
            } => Self::Interrupted { resource, params },
        }
    }

    /// Whether a later attempt of the same request may succeed.
    ///
    /// True for transport failures, HTTP 429 and HTTP 5xx.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode { .. }
            | Self::Fault { .. }
            | Self::Interrupted { .. }
            | Self::InvalidRequest { .. } => false,
        }
    }

    /// Whether the failure is a cancellation rather than a provider fault.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn status(code: u16) -> FetchError {
        FetchError::Status {
            resource: ResourceKind::MovieCredits,
            params: String::from("movie_id=550"),
            status: code,
            message: String::from("boom"),
        }
    }

    #[test]
    fn test_status_retry_classification() {
        // Arrange & Act & Assert
        assert!(status(429).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(401).is_retryable());
    }

    #[test]
    fn test_decode_is_not_retryable() {
        // Arrange
        let source = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = FetchError::Decode {
            resource: ResourceKind::MovieImages,
            params: String::from("movie_id=1"),
            source,
        };

        // Act & Assert
        assert!(!err.is_retryable());
        assert!(!err.is_interrupted());
        assert_eq!(err.resource(), ResourceKind::MovieImages);
    }

    #[test]
    fn test_display_includes_resource_and_params() {
        // Arrange
        let err = status(404);

        // Act
        let message = err.to_string();

        // Assert
        assert!(message.contains("movie/{id}/credits"));
        assert!(message.contains("movie_id=550"));
        assert!(message.contains("HTTP 404"));
    }

    #[test]
    fn test_interrupted_flag() {
        // Arrange
        let err = FetchError::Interrupted {
            resource: ResourceKind::MovieVideos,
            params: String::new(),
        };

        // Act & Assert
        assert!(err.is_interrupted());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_into_interrupted_keeps_request() {
        // Arrange
        let err = status(503);

        // Act
        let interrupted = err.into_interrupted();

        // Assert
        assert!(interrupted.is_interrupted());
        assert_eq!(interrupted.resource(), ResourceKind::MovieCredits);
        assert_eq!(interrupted.params(), "movie_id=550");
    }
}
