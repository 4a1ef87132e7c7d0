//! Application configuration module.
//!
//! Manages the TOML config file holding provider, batching and schedule
//! settings. Secrets never live here; they come from the environment.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::{AppConfig, BatchConfig, KoficConfig, ScheduleConfig, TmdbConfig};
pub use paths::resolve_config_path;
