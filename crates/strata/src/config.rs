//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for [`EngineConfig`]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A setting is out of range
    #[error("Invalid setting {field}: {reason}")]
    Invalid {
        /// Setting name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Timeouts and concurrency limits of the computation engine.
///
/// Every field has a default, so a JSON file only needs the settings it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout of one raw data fetch, in milliseconds
    pub fetch_timeout_ms: u64,
    /// Timeout of one store operation, in milliseconds
    pub store_timeout_ms: u64,
    /// Entities computed at the same time within one request
    pub entity_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 30_000,
            store_timeout_ms: 10_000,
            entity_concurrency: 8,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Parse a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every setting is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "store_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.entity_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "entity_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Set the fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the store timeout.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the entity concurrency, clamped to at least 1.
    pub fn with_entity_concurrency(mut self, concurrency: usize) -> Self {
        self.entity_concurrency = concurrency.max(1);
        self
    }

    /// Fetch timeout.
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Store timeout.
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
