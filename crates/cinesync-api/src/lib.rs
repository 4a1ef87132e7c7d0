//! API client library for cinesync.
//!
//! Provides rate-limited clients for the TMDB API and the KOFIC box-office
//! API. Every client performs exactly one request per call and reports
//! failures as a typed [`FetchError`]; retry policy belongs to the caller.

mod error;
mod http;
/// KOFIC box-office API client.
pub mod kofic;
mod rate_limiter;
mod resource;
/// TMDB API client.
pub mod tmdb;

pub use error::FetchError;
#[allow(clippy::module_name_repetitions)]
pub use rate_limiter::{
    AcquireError, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_CAPACITY, DEFAULT_WINDOW, RateLimiter,
};
pub use resource::{MovieList, ResourceKind};

/// Provider-shaped payload entry, decoded item by item by the caller.
pub type RawItem = serde_json::Value;
