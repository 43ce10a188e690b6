//! Error types for the feature registry and transformations.

use thiserror::Error;

/// Result type for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Errors raised by the registry or by a transformation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    /// No definition for the requested name (and version)
    #[error("Unknown feature: {name}{}", .version.map(|v| format!("@{v}")).unwrap_or_default())]
    UnknownFeature {
        /// Feature name
        name: String,
        /// Requested version, `None` for latest
        version: Option<u32>,
    },

    /// `(name, version)` is already registered
    #[error("Feature {name}@{version} is already registered")]
    DuplicateFeatureVersion {
        /// Feature name
        name: String,
        /// Conflicting version
        version: u32,
    },

    /// Dependencies do not form a DAG
    #[error("Cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// Features along the cycle, first and last entries equal
        cycle: Vec<String>,
    },

    /// Definition rejected at registration
    #[error("Invalid definition for {name}: {reason}")]
    InvalidDefinition {
        /// Feature name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Transformation applied to the wrong number of inputs
    #[error("{transformation} expects {expected} input(s), got {actual}")]
    Arity {
        /// Transformation name
        transformation: &'static str,
        /// Human readable expected arity
        expected: &'static str,
        /// Inputs provided
        actual: usize,
    },
}
