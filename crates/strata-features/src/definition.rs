//! Feature definitions.

use crate::transform::{FeatureCategory, Transformation};
use serde::{Deserialize, Serialize};
use std::fmt;
use strata_data::ObservationKind;

/// `(name, version)` identifying one definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureKey {
    /// Feature name
    pub name: String,
    /// Feature version
    pub version: u32,
}

impl FeatureKey {
    /// Create a new key.
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// An input of a feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Dependency {
    /// Raw observations of one kind
    Raw {
        /// Observation kind
        kind: ObservationKind,
    },
    /// Another feature, pinned to a version or following its latest
    Feature {
        /// Feature name
        name: String,
        /// Pinned version, `None` for latest
        version: Option<u32>,
    },
}

impl Dependency {
    /// Raw observation dependency.
    pub const fn raw(kind: ObservationKind) -> Self {
        Self::Raw { kind }
    }

    /// Dependency on the latest version of a feature.
    pub fn feature(name: impl Into<String>) -> Self {
        Self::Feature {
            name: name.into(),
            version: None,
        }
    }

    /// Dependency on a pinned feature version.
    pub fn feature_version(name: impl Into<String>, version: u32) -> Self {
        Self::Feature {
            name: name.into(),
            version: Some(version),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw { kind } => write!(f, "raw:{kind}"),
            Self::Feature {
                name,
                version: Some(v),
            } => write!(f, "{name}@{v}"),
            Self::Feature {
                name,
                version: None,
            } => f.write_str(name),
        }
    }
}

/// A named, versioned, pure transformation over its dependencies.
///
/// Definitions are immutable once registered; a change in logic is a new
/// version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    name: String,
    version: u32,
    dependencies: Vec<Dependency>,
    transformation: Transformation,
    description: String,
}

impl FeatureDefinition {
    /// Start a definition with no dependencies.
    pub fn new(name: impl Into<String>, version: u32, transformation: Transformation) -> Self {
        Self {
            name: name.into(),
            version,
            dependencies: Vec::new(),
            transformation,
            description: String::new(),
        }
    }

    /// Append a dependency. Order matters: it is the input order of the transformation.
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Feature name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feature version.
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// `(name, version)` key.
    pub fn key(&self) -> FeatureKey {
        FeatureKey::new(&self.name, self.version)
    }

    /// Declared dependencies in input order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Feature dependencies only.
    pub fn feature_dependencies(&self) -> impl Iterator<Item = (&str, Option<u32>)> {
        self.dependencies.iter().filter_map(|d| match d {
            Dependency::Feature { name, version } => Some((name.as_str(), *version)),
            Dependency::Raw { .. } => None,
        })
    }

    /// Raw observation kinds needed directly by this definition.
    pub fn raw_dependencies(&self) -> impl Iterator<Item = ObservationKind> + '_ {
        self.dependencies.iter().filter_map(|d| match d {
            Dependency::Raw { kind } => Some(*kind),
            Dependency::Feature { .. } => None,
        })
    }

    /// Transformation applied to the inputs.
    pub const fn transformation(&self) -> Transformation {
        self.transformation
    }

    /// Category of the transformation.
    pub const fn category(&self) -> FeatureCategory {
        self.transformation.category()
    }

    /// Description.
    pub fn description(&self) -> &str {
        &self.description
    }
}
