//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// A single upstream record that could not be normalized.
///
/// Malformed records never fail a fetch. They are skipped and handed back to
/// the caller as warnings alongside the observations that did normalize.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed record #{index}: {reason}")]
pub struct MalformedRecord {
    /// Position of the record in the upstream payload
    pub index: usize,
    /// What was wrong with it
    pub reason: String,
}

impl MalformedRecord {
    /// Create a new malformed record warning.
    pub fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Upstream could not be reached (transient, retryable by the caller)
    #[error("Source unavailable for {entity}: {reason}")]
    SourceUnavailable {
        /// Entity that was being fetched
        entity: String,
        /// Reason reported by the source
        reason: String,
    },

    /// A record missing required fields
    #[error(transparent)]
    MalformedRecord(#[from] MalformedRecord),

    /// Invalid time range
    #[error("Invalid time range: start {start} is after end {end}")]
    InvalidTimeRange {
        /// Start of the range
        start: String,
        /// End of the range
        end: String,
    },

    /// Invalid entity identifier
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    /// Unknown observation kind
    #[error("Unknown observation kind: {0}")]
    UnknownKind(String),

    /// Payload parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Time conversion error
    #[error("Time conversion error: {0}")]
    TimeConversion(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    /// Build a [`DataError::SourceUnavailable`] for an entity.
    pub fn unavailable(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}
