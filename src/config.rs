//! Configuration management
//!
//! TOML configuration with environment variable overrides and sensible
//! defaults. Every section and field is optional in the file.
//!
//! ```toml
//! [transport]
//! base_url = "http://graphite.internal:8080"
//! timeout_secs = 30
//!
//! [cache]
//! enabled = true
//! max_entries = 1000
//! ttl_secs = 60
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Render API transport
    #[serde(default)]
    pub transport: TransportConfig,

    /// Response cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Base URL of the Graphite web service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_base_url() -> String { "http://localhost:8080".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_user_agent() -> String { format!("graphite-band/{}", env!("CARGO_PKG_VERSION")) }
fn default_log_level() -> String { "info".to_string() }

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable numeric or boolean values are ignored.
    pub fn apply_env_overrides(&mut self) {
        // Transport
        if let Ok(url) = std::env::var("GRAPHITE_URL") {
            self.transport.base_url = url;
        }
        if let Ok(timeout) = std::env::var("GRAPHITE_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                self.transport.timeout_secs = t;
            }
        }

        // Cache
        if let Ok(enabled) = std::env::var("GRAPHITE_CACHE_ENABLED") {
            if let Ok(e) = enabled.parse() {
                self.cache.enabled = e;
            }
        }
        if let Ok(max_entries) = std::env::var("GRAPHITE_CACHE_MAX_ENTRIES") {
            if let Ok(m) = max_entries.parse() {
                self.cache.max_entries = m;
            }
        }
        if let Ok(ttl) = std::env::var("GRAPHITE_CACHE_TTL_SECS") {
            if let Ok(t) = ttl.parse() {
                self.cache.ttl_secs = t;
            }
        }

        // Logging
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.logging.level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::Configuration(msg.to_string()));

        if let Err(e) = url::Url::parse(&self.transport.base_url) {
            return Err(Error::Configuration(format!(
                "Invalid base URL '{}': {}",
                self.transport.base_url, e
            )));
        }
        if self.transport.timeout_secs == 0 {
            return invalid("Transport timeout must be > 0");
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return invalid("Cache max entries must be > 0 when the cache is enabled");
        }
        if self.logging.level.trim().is_empty() {
            return invalid("Log level cannot be empty");
        }

        Ok(())
    }
}
