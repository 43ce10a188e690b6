//! Errors surfaced by the engine and the query service.

use serde::{Deserialize, Serialize};
use std::fmt;
use strata_data::DataError;
use strata_features::FeatureError;
use strata_store::StoreError;
use thiserror::Error;

/// Failure while computing one feature.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// Raw data source failure
    #[error(transparent)]
    Data(#[from] DataError),

    /// Registry or transformation failure
    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Raw data violates the source contract
    #[error("data integrity violation for {entity}: {reason}")]
    DataIntegrity {
        /// Entity whose data was rejected
        entity: String,
        /// What was wrong
        reason: String,
    },
}

impl ComputeError {
    /// Classification of the error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Data(err) => match err {
                DataError::SourceUnavailable { .. } | DataError::Io(_) => ErrorKind::SourceUnavailable,
                DataError::InvalidTimeRange { .. } => ErrorKind::InvalidTimeRange,
                DataError::InvalidEntity(_) => ErrorKind::InvalidEntity,
                DataError::MalformedRecord(_)
                | DataError::UnknownKind(_)
                | DataError::Parse(_)
                | DataError::Serialization(_)
                | DataError::TimeConversion(_) => ErrorKind::MalformedRecord,
            },
            Self::Feature(err) => match err {
                FeatureError::UnknownFeature { .. } => ErrorKind::UnknownFeature,
                FeatureError::DuplicateFeatureVersion { .. } => ErrorKind::DuplicateFeatureVersion,
                FeatureError::CyclicDependency { .. } => ErrorKind::CyclicDependency,
                FeatureError::InvalidDefinition { .. } | FeatureError::Arity { .. } => {
                    ErrorKind::InvalidDefinition
                }
            },
            Self::Store(err) => match err {
                StoreError::CacheConflict { .. } => ErrorKind::CacheConflict,
                StoreError::CacheUnavailable(_) => ErrorKind::CacheUnavailable,
                StoreError::Database(_) | StoreError::Serialization(_) => ErrorKind::Storage,
            },
            Self::DataIntegrity { .. } => ErrorKind::DataIntegrity,
        }
    }
}

/// Errors returned by [`ComputeEngine`](crate::ComputeEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Computing a feature failed; nothing was written
    #[error("computation of {feature} failed: {cause}")]
    ComputationFailed {
        /// Requested feature
        feature: String,
        /// Underlying failure
        #[source]
        cause: ComputeError,
    },
}

impl EngineError {
    /// Classification of the underlying failure.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ComputationFailed { cause, .. } => cause.kind(),
        }
    }

    /// Underlying failure.
    pub const fn cause(&self) -> &ComputeError {
        match self {
            Self::ComputationFailed { cause, .. } => cause,
        }
    }
}

/// Stable classification of errors for responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Upstream data source unreachable or timed out
    SourceUnavailable,
    /// Upstream record could not be used
    MalformedRecord,
    /// Range start after its end
    InvalidTimeRange,
    /// Blank entity identifier
    InvalidEntity,
    /// Feature or version not registered
    UnknownFeature,
    /// Feature version registered twice
    DuplicateFeatureVersion,
    /// Feature dependencies form a cycle
    CyclicDependency,
    /// Definition cannot be evaluated
    InvalidDefinition,
    /// Recomputed value differs from the stored one
    CacheConflict,
    /// Store unreachable or timed out
    CacheUnavailable,
    /// Store failed internally
    Storage,
    /// Raw data violates the source contract
    DataIntegrity,
}

impl ErrorKind {
    /// Whether retrying the same request may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SourceUnavailable | Self::CacheUnavailable)
    }

    /// Snake-case name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SourceUnavailable => "source_unavailable",
            Self::MalformedRecord => "malformed_record",
            Self::InvalidTimeRange => "invalid_time_range",
            Self::InvalidEntity => "invalid_entity",
            Self::UnknownFeature => "unknown_feature",
            Self::DuplicateFeatureVersion => "duplicate_feature_version",
            Self::CyclicDependency => "cyclic_dependency",
            Self::InvalidDefinition => "invalid_definition",
            Self::CacheConflict => "cache_conflict",
            Self::CacheUnavailable => "cache_unavailable",
            Self::Storage => "storage",
            Self::DataIntegrity => "data_integrity",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
