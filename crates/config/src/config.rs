//! Core configuration structures for the Swapdesk engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
///
/// Every section is optional in source files; missing sections and fields
/// fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Exchange provider connection
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Quote negotiation timing
    #[serde(default)]
    pub quote: QuoteConfig,

    /// Order status polling
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Rate-lock persistence
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Environment types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    #[default]
    Local,
}

impl Environment {
    pub fn is_local(&self) -> bool {
        matches!(self, Environment::Local)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Exchange provider configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the provider's REST API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; required outside local setups
    #[serde(default)]
    pub api_key: String,

    /// Header carrying the API key
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("api_key_header", &self.api_key_header)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            api_key_header: default_api_key_header(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Quote negotiation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteConfig {
    /// Longest wait for an estimate before giving up
    #[serde(default = "default_quote_timeout_ms")]
    pub timeout_ms: u64,

    /// Window in which rapid edits collapse into one request
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long fetched amount bounds are reused
    #[serde(default = "default_bounds_ttl_secs")]
    pub bounds_ttl_secs: u64,
}

impl QuoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn bounds_ttl(&self) -> Duration {
        Duration::from_secs(self.bounds_ttl_secs)
    }
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_quote_timeout_ms(),
            debounce_ms: default_debounce_ms(),
            bounds_ttl_secs: default_bounds_ttl_secs(),
        }
    }
}

/// Order status tracking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Consecutive failed polls before the order is reported unavailable
    #[serde(default = "default_transient_failure_threshold")]
    pub transient_failure_threshold: u32,
}

impl TrackingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            transient_failure_threshold: default_transient_failure_threshold(),
        }
    }
}

/// Rate-lock storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// SQLite database path; the lock lives in memory when absent
    #[serde(default)]
    pub rate_lock_db: Option<PathBuf>,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://api.changenow.io/v2".to_string()
}

fn default_api_key_header() -> String {
    "x-changenow-api-key".to_string()
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_quote_timeout_ms() -> u64 {
    12_000
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_bounds_ttl_secs() -> u64 {
    60
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_transient_failure_threshold() -> u32 {
    3
}
