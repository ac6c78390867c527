//! Runtime configuration.
//!
//! Configuration is read from a TOML file and overridden by `HONDANA_`
//! environment variables, with `__` separating nested keys
//! (`HONDANA_BATCH__CHUNK_SIZE=20`). Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! [fetch]
//! timeout_secs = 15
//! max_attempts = 3
//!
//! [schedule]
//! refresh_pages = [1, 2, 3]
//! fast_source = "manga"
//!
//! [database]
//! manga = "data/manga.db"
//! ```

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::source::SourceKind;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// HTTP fetch behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay unit for exponential backoff; attempt `n` waits `base * 2^(n-1)`
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

/// Batch fan-out and throttling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Maximum number of detail fetches in flight at once
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pause after each chunk
    #[serde(default = "default_chunk_pause_ms")]
    pub chunk_pause_ms: u64,
    /// Pause between listing pages during a full crawl
    #[serde(default = "default_page_pause_ms")]
    pub page_pause_ms: u64,
}

impl BatchConfig {
    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms)
    }

    pub fn page_pause(&self) -> Duration {
        Duration::from_millis(self.page_pause_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_pause_ms: default_chunk_pause_ms(),
            page_pause_ms: default_page_pause_ms(),
        }
    }
}

/// Refresh cycle cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_slow_interval_secs")]
    pub slow_interval_secs: u64,
    #[serde(default = "default_fast_interval_secs")]
    pub fast_interval_secs: u64,
    /// Listing pages re-fetched on every tick
    #[serde(default = "default_refresh_pages")]
    pub refresh_pages: Vec<u32>,
    /// The high-churn source refreshed by the fast cycle
    #[serde(default = "default_fast_source")]
    pub fast_source: SourceKind,
}

impl ScheduleConfig {
    pub fn slow_interval(&self) -> Duration {
        Duration::from_secs(self.slow_interval_secs)
    }

    pub fn fast_interval(&self) -> Duration {
        Duration::from_secs(self.fast_interval_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            slow_interval_secs: default_slow_interval_secs(),
            fast_interval_secs: default_fast_interval_secs(),
            refresh_pages: default_refresh_pages(),
            fast_source: default_fast_source(),
        }
    }
}

/// Search defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

/// One SQLite file per source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_shojo_db")]
    pub shojo: PathBuf,
    #[serde(default = "default_toongod_db")]
    pub toongod: PathBuf,
    #[serde(default = "default_manga_db")]
    pub manga: PathBuf,
}

impl DatabaseConfig {
    pub fn path_for(&self, kind: SourceKind) -> &Path {
        match kind {
            SourceKind::Shojo => &self.shojo,
            SourceKind::ToonGod => &self.toongod,
            SourceKind::Manga => &self.manga,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            shojo: default_shojo_db(),
            toongod: default_toongod_db(),
            manga: default_manga_db(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    3000
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_chunk_size() -> usize {
    40
}
fn default_chunk_pause_ms() -> u64 {
    1000
}
fn default_page_pause_ms() -> u64 {
    5000
}
fn default_slow_interval_secs() -> u64 {
    3600
}
fn default_fast_interval_secs() -> u64 {
    600
}
fn default_refresh_pages() -> Vec<u32> {
    vec![1, 2, 3]
}
fn default_fast_source() -> SourceKind {
    SourceKind::Manga
}
fn default_threshold() -> f64 {
    crate::types::DEFAULT_THRESHOLD
}
fn default_shojo_db() -> PathBuf {
    PathBuf::from("shojo.db")
}
fn default_toongod_db() -> PathBuf {
    PathBuf::from("toongod.db")
}
fn default_manga_db() -> PathBuf {
    PathBuf::from("manga.db")
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(Error::config(format!(
            "configuration file not found: {}",
            path.display()
        )));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("HONDANA_").split("__"))
        .extract()
        .map_err(|e| Error::config(e.to_string()))?;

    validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config> {
    let config: Config = toml::from_str(toml_str).map_err(|e| Error::config(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Rejects values that would stall or disable the pipeline.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.batch.chunk_size == 0 {
        return Err(Error::config("batch.chunk_size must be at least 1"));
    }
    if config.fetch.max_attempts == 0 {
        return Err(Error::config("fetch.max_attempts must be at least 1"));
    }
    if config.schedule.slow_interval_secs == 0 || config.schedule.fast_interval_secs == 0 {
        return Err(Error::config("schedule intervals must be at least 1 second"));
    }
    if config.schedule.refresh_pages.is_empty() {
        return Err(Error::config("schedule.refresh_pages cannot be empty"));
    }
    if !(0.0..=1.0).contains(&config.search.threshold) {
        return Err(Error::config("search.threshold must be within [0, 1]"));
    }
    Ok(())
}
