//! `AppConfig` struct and TOML loading.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use cinesync_api::{MovieList, RateLimiter};
use cinesync_ingest::coordinator::DEFAULT_BATCH_SIZE;
use cinesync_ingest::retriever::DEFAULT_WORKERS;
use cinesync_ingest::tmdb_job::DEFAULT_MAX_PAGES;
use cinesync_ingest::{BatchSettings, RetryPolicy, TmdbOptions, WorkerPool};
use serde::Deserialize;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// TMDB provider settings.
    #[serde(default)]
    pub tmdb: TmdbConfig,
    /// KOFIC provider settings.
    #[serde(default)]
    pub kofic: KoficConfig,
    /// Batching, worker pool and retry settings.
    #[serde(default)]
    pub batch: BatchConfig,
    /// Daily run times.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// TMDB provider configuration.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TmdbConfig {
    /// Response language.
    pub language: String,
    /// Availability region (ISO 3166-1).
    pub region: String,
    /// Page cap per movie list.
    pub max_pages: u32,
    /// Movie lists to walk: `discover`, `now_playing`, `upcoming`, `popular`.
    pub movie_lists: Vec<String>,
    /// Requests allowed per window.
    pub rate_capacity: usize,
    /// Rate window length in seconds.
    pub rate_window_secs: u64,
    /// Longest wait for a rate slot before a fresh attempt, in milliseconds.
    pub acquire_timeout_ms: u64,
    /// Minimum gap between consecutive requests, in milliseconds.
    pub min_spacing_ms: u64,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            language: String::from("ko-KR"),
            region: String::from("KR"),
            max_pages: DEFAULT_MAX_PAGES,
            movie_lists: vec![String::from(MovieList::Discover.name())],
            rate_capacity: 40,
            rate_window_secs: 10,
            acquire_timeout_ms: 1000,
            min_spacing_ms: 0,
        }
    }
}

impl TmdbConfig {
    /// Parses `movie_lists`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown list name or an empty list.
    pub fn movie_lists(&self) -> Result<Vec<MovieList>> {
        let lists = self
            .movie_lists
            .iter()
            .map(|name| {
                MovieList::from_name(name)
                    .with_context(|| format!("unknown movie list `{name}` in [tmdb]"))
            })
            .collect::<Result<Vec<_>>>()?;
        if lists.is_empty() {
            bail!("[tmdb] movie_lists must name at least one list");
        }
        Ok(lists)
    }

    /// Job options derived from this section.
    ///
    /// # Errors
    ///
    /// Returns an error if `movie_lists` is invalid.
    pub fn options(&self) -> Result<TmdbOptions> {
        Ok(TmdbOptions {
            movie_lists: self.movie_lists()?,
            max_pages: self.max_pages,
            region: self.region.clone(),
        })
    }

    /// Limiter shared by every TMDB request of the process.
    #[must_use]
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::new(
            RateLimiter::new(
                "tmdb",
                self.rate_capacity,
                Duration::from_secs(self.rate_window_secs),
            )
            .with_acquire_timeout(Duration::from_millis(self.acquire_timeout_ms))
            .with_min_spacing(Duration::from_millis(self.min_spacing_ms)),
        )
    }
}

/// KOFIC provider configuration.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KoficConfig {
    /// Requests allowed per window.
    pub rate_capacity: usize,
    /// Rate window length in seconds.
    pub rate_window_secs: u64,
}

impl Default for KoficConfig {
    fn default() -> Self {
        Self {
            rate_capacity: 10,
            rate_window_secs: 1,
        }
    }
}

impl KoficConfig {
    /// Limiter shared by every KOFIC request of the process.
    #[must_use]
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(
            "kofic",
            self.rate_capacity,
            Duration::from_secs(self.rate_window_secs),
        ))
    }
}

/// Batching configuration.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchConfig {
    /// Units per batch.
    pub size: usize,
    /// Concurrent fetch workers.
    pub workers: usize,
    /// Pause between batches, in seconds.
    pub inter_batch_delay_secs: u64,
    /// Retries of a retryable unit fetch.
    pub max_retries: u32,
    /// Base retry backoff, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            inter_batch_delay_secs: 10,
            max_retries: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl BatchConfig {
    /// Coordinator settings derived from this section.
    #[must_use]
    pub const fn settings(&self) -> BatchSettings {
        BatchSettings {
            size: self.size,
            inter_batch_delay: Duration::from_secs(self.inter_batch_delay_secs),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff: Duration::from_millis(self.retry_backoff_ms),
            },
        }
    }

    /// Worker pool of the configured size.
    #[must_use]
    pub fn pool(&self) -> WorkerPool {
        WorkerPool::new(self.workers)
    }
}

/// Daily schedule, local wall-clock `HH:MM`.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleConfig {
    /// TMDB job start time.
    pub tmdb_at: String,
    /// KOFIC job start time.
    pub kofic_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tmdb_at: String::from("01:00"),
            kofic_at: String::from("10:00"),
        }
    }
}

impl ScheduleConfig {
    /// Parses `tmdb_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not `HH:MM`.
    pub fn tmdb_time(&self) -> Result<NaiveTime> {
        parse_clock("tmdb_at", &self.tmdb_at)
    }

    /// Parses `kofic_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not `HH:MM`.
    pub fn kofic_time(&self) -> Result<NaiveTime> {
        parse_clock("kofic_at", &self.kofic_at)
    }
}

fn parse_clock(key: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("[schedule] {key} must be HH:MM, got `{value}`"))
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}
