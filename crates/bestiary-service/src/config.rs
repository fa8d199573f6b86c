use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

/// Controls the log format
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect (pretty for tty, simplified for other)
    Auto,
    /// With colors
    Pretty,
    /// Simplified log output
    Simplified,
    /// Dump out JSON lines
    Json,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// The log level filter, in `EnvFilter` syntax.
    pub level: String,
    /// Controls the log format.
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: "info".into(),
            format: LogFormat::Auto,
        }
    }
}

/// Capacities for the in-memory caches.
///
/// Each capacity is a number of cached values, not bytes. Full detail records
/// are the largest values and get the smallest cache; summaries are cheap and
/// plentiful; index pages are few but big.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct CacheCapacities {
    /// Capacity of the full detail record cache.
    pub entries: NonZeroUsize,
    /// Capacity of the derived summary cache.
    pub summaries: NonZeroUsize,
    /// Capacity of the index page cache.
    pub index_pages: NonZeroUsize,
}

impl Default for CacheCapacities {
    fn default() -> Self {
        Self {
            entries: NonZeroUsize::new(100).unwrap(),
            summaries: NonZeroUsize::new(250).unwrap(),
            index_pages: NonZeroUsize::new(8).unwrap(),
        }
    }
}

/// Timeouts and retry behavior for catalog requests.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// The timeout for establishing a connection.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// The deadline for one complete request, headers and body included.
    ///
    /// Exceeding it counts as a transient failure and is eligible for retry.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Total number of attempts for a transiently failing request.
    pub max_retries: usize,
    /// Base delay between retries; attempt `n` waits `retry_backoff * 2^n`.
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// Tuning for the incremental search pipeline.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// How long input has to stay quiet before a query is executed.
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
    /// Upper bound on the number of matches a single query resolves.
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            max_results: 20,
        }
    }
}

/// The bestiary runtime config.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the remote catalog.
    pub catalog_url: Url,
    /// Page size used when preloading the full name index.
    pub index_limit: usize,
    /// In-memory cache capacities.
    pub caches: CacheCapacities,
    /// Network timeouts and retry behavior.
    pub fetch: FetchConfig,
    /// Search pipeline tuning.
    pub search: SearchConfig,
    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_url: "https://bestiary.dev/api/v1/"
                .parse()
                .expect("static default url"),
            index_limit: 50_000,
            caches: CacheCapacities::default(),
            fetch: FetchConfig::default(),
            search: SearchConfig::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads the config from a YAML file, or the defaults if no path is given.
    pub fn get(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to open config file at {}", path.display()))?;
        serde_yaml::from_str(&source)
            .with_context(|| format!("failed to parse config file at {}", path.display()))
    }
}
