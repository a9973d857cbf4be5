//! Session-wide configuration.
//!
//! Defaults point at the public JSONPlaceholder backend with a 10 second
//! request timeout, a 2 minute stale time and a 10 minute garbage
//! collection window. `from_env` overlays `PLACEHOLDER_*` variables so the
//! integration tests and the mock server can redirect traffic.

use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

pub const BASE_URL_VAR: &str = "PLACEHOLDER_API_URL";
pub const TIMEOUT_VAR: &str = "PLACEHOLDER_API_TIMEOUT_MS";
pub const STALE_TIME_VAR: &str = "PLACEHOLDER_STALE_TIME_MS";
pub const GC_TIME_VAR: &str = "PLACEHOLDER_GC_TIME_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a whole number of milliseconds, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub default_timeout: Duration,
    pub default_headers: Vec<(String, String)>,
    /// How long a fetched query result is served without a network call.
    pub stale_time: Duration,
    /// How long an unused cache entry survives before eviction.
    pub gc_time: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_timeout: Duration::from_secs(10),
            default_headers: vec![("content-type".to_string(), "application/json".to_string())],
            stale_time: Duration::from_secs(2 * 60),
            gc_time: Duration::from_secs(10 * 60),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Self {
        Self::default().with_base_url(base_url)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Defaults overlaid with whatever `PLACEHOLDER_*` variables are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup(BASE_URL_VAR) {
            config = config.with_base_url(&url);
        }
        if let Some(timeout) = millis(&lookup, TIMEOUT_VAR)? {
            config.default_timeout = timeout;
        }
        if let Some(stale) = millis(&lookup, STALE_TIME_VAR)? {
            config.stale_time = stale;
        }
        if let Some(gc) = millis(&lookup, GC_TIME_VAR)? {
            config.gc_time = gc;
        }
        Ok(config)
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u64>()
        .map(|ms| Some(Duration::from_millis(ms)))
        .map_err(|_| ConfigError::InvalidNumber { var, value })
}
