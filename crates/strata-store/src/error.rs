//! Error types for the feature store.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the feature store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A committed value differs from the one being written
    #[error(
        "cache conflict for {entity} {feature}@{version} at {timestamp}: stored {existing:?}, attempted {attempted:?}"
    )]
    CacheConflict {
        /// Entity identifier
        entity: String,
        /// Feature name
        feature: String,
        /// Feature version
        version: u32,
        /// Conflicting timestamp
        timestamp: DateTime<Utc>,
        /// Value already committed
        existing: Option<f64>,
        /// Value that was rejected
        attempted: Option<f64>,
    },

    /// The store cannot be reached or did not answer in time
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// SQLite error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A key or value could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether the caller may retry the same operation.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::CacheUnavailable(_))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::CacheUnavailable(format!("store worker failed: {err}"))
    }
}
