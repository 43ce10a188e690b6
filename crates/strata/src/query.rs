//! Query interface over the computation engine.
//!
//! Request and response types are plain serde types so an HTTP layer can
//! serve them directly.

use crate::engine::{ComputationRequest, ComputeEngine};
use crate::error::{ComputeError, ErrorKind};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strata_data::{EntityId, TimeRange};
use strata_features::{FeatureCategory, FeatureDefinition, FeatureError};
use strata_output::FeatureTable;
use tracing::info;

/// Features over a set of entities and a time range.
///
/// A feature may be pinned as `name@version`; otherwise `version` applies,
/// and without it the latest registered version is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Entities to compute
    pub entities: Vec<EntityId>,
    /// Feature names, optionally `name@version`
    pub features: Vec<String>,
    /// Inclusive time range
    pub range: TimeRange,
    /// Version applied to features that are not pinned
    #[serde(default)]
    pub version: Option<u32>,
}

impl QueryRequest {
    /// Request the latest version of every feature.
    pub const fn new(entities: Vec<EntityId>, features: Vec<String>, range: TimeRange) -> Self {
        Self {
            entities,
            features,
            range,
            version: None,
        }
    }
}

/// A feature that could not be served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFailure {
    /// Feature as requested
    pub feature: String,
    /// Error classification
    pub kind: ErrorKind,
    /// Human readable message
    pub message: String,
}

impl FeatureFailure {
    fn new(feature: impl Into<String>, error: &ComputeError) -> Self {
        Self {
            feature: feature.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Values of every feature that succeeded plus one failure per feature that did not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Entity × timestamp × feature values
    pub table: FeatureTable,
    /// Failed features; they contribute no columns
    pub errors: Vec<FeatureFailure>,
}

impl QueryResponse {
    /// Whether every requested feature succeeded.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Registry entry as listed by [`QueryService::catalogue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSummary {
    /// Feature name
    pub name: String,
    /// Feature version
    pub version: u32,
    /// Transformation category
    pub category: FeatureCategory,
    /// Transformation, e.g. `difference(1)`
    pub transformation: String,
    /// Dependencies, raw kinds as `raw:<kind>`
    pub dependencies: Vec<String>,
    /// Description
    pub description: String,
}

impl From<&FeatureDefinition> for FeatureSummary {
    fn from(definition: &FeatureDefinition) -> Self {
        Self {
            name: definition.name().to_string(),
            version: definition.version(),
            category: definition.category(),
            transformation: definition.transformation().to_string(),
            dependencies: definition.dependencies().iter().map(ToString::to_string).collect(),
            description: definition.description().to_string(),
        }
    }
}

/// Split `name@version` into its parts.
fn parse_feature(feature: &str) -> Result<(&str, Option<u32>), FeatureError> {
    match feature.rsplit_once('@') {
        None => Ok((feature.trim(), None)),
        Some((name, version)) => {
            let version = version
                .trim()
                .parse()
                .map_err(|_| FeatureError::UnknownFeature {
                    name: feature.to_string(),
                    version: None,
                })?;
            Ok((name.trim(), Some(version)))
        }
    }
}

/// Entry point for feature queries.
#[derive(Debug, Clone)]
pub struct QueryService {
    engine: ComputeEngine,
}

impl QueryService {
    /// Create a service over an engine.
    pub const fn new(engine: ComputeEngine) -> Self {
        Self { engine }
    }

    /// Underlying engine.
    pub const fn engine(&self) -> &ComputeEngine {
        &self.engine
    }

    /// Every registered feature version.
    pub fn catalogue(&self) -> Vec<FeatureSummary> {
        self.engine
            .registry()
            .list()
            .iter()
            .map(|definition| FeatureSummary::from(definition.as_ref()))
            .collect()
    }

    /// Compute every requested feature.
    ///
    /// Features are validated against the registry first; unknown ones are
    /// reported without reaching the engine. Names resolving to the same
    /// `feature@version` run once, under the first spelling requested. Valid
    /// features run concurrently and one failing feature never prevents the
    /// others from being returned.
    #[tracing::instrument(
        skip_all,
        fields(entities = request.entities.len(), features = request.features.len())
    )]
    pub async fn query(&self, request: QueryRequest) -> QueryResponse {
        let mut errors = Vec::new();
        let mut valid = Vec::new();
        let mut seen = HashSet::new();
        for feature in &request.features {
            let resolved = parse_feature(feature).and_then(|(name, pinned)| {
                self.engine
                    .registry()
                    .resolve(name, pinned.or(request.version))
            });
            match resolved {
                Ok(definition) => {
                    if seen.insert(definition.key()) {
                        valid.push((feature.as_str(), definition.key()));
                    }
                }
                Err(err) => errors.push(FeatureFailure::new(feature.as_str(), &ComputeError::from(err))),
            }
        }

        let computations = valid.iter().map(|(_, key)| {
            let computation =
                ComputationRequest::new(request.entities.clone(), key.name.clone(), request.range)
                    .with_version(key.version);
            self.engine.compute(computation)
        });
        let results = join_all(computations).await;

        let rejected = errors.len();
        let mut table = FeatureTable::new();
        let mut succeeded = 0;
        for ((feature, _), result) in valid.iter().zip(results) {
            match result {
                Ok(computed) => {
                    table.merge(computed);
                    succeeded += 1;
                }
                Err(err) => errors.push(FeatureFailure::new(*feature, err.cause())),
            }
        }

        info!(succeeded, rejected, failed = errors.len() - rejected, "query served");
        QueryResponse { table, errors }
    }
}
