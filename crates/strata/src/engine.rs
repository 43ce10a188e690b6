//! Feature computation engine.
//!
//! A computation resolves the requested feature's dependency graph, checks
//! what the store already covers, fetches an entity's raw history once for
//! the rest, and runs the graph leaf-first. New values of every
//! entity are staged and committed together once all entities succeeded, so
//! a failed or cancelled request never leaves partial writes behind.

use crate::config::EngineConfig;
use crate::error::{ComputeError, EngineError};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use strata_data::{DataError, EntityId, FetchOutcome, ObservationKind, RawObservation, RawSource, TimeRange};
use strata_features::{Dependency, FeatureDefinition, FeatureError, FeatureKey, FeatureRegistry, TimeSeries};
use strata_output::FeatureTable;
use strata_store::{CachedSeries, FeatureStore, SeriesKey, SeriesWrite, StoreError, WriteBatch};
use tracing::{debug, info, warn};

/// One feature over a set of entities and a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationRequest {
    /// Entities to compute
    pub entities: Vec<EntityId>,
    /// Feature name
    pub feature: String,
    /// Inclusive time range
    pub range: TimeRange,
    /// Feature version, `None` for the latest
    #[serde(default)]
    pub version: Option<u32>,
}

impl ComputationRequest {
    /// Request the latest version of `feature`.
    pub fn new(entities: Vec<EntityId>, feature: impl Into<String>, range: TimeRange) -> Self {
        Self {
            entities,
            feature: feature.into(),
            range,
            version: None,
        }
    }

    /// Pin the feature version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }
}

/// Result of one entity.
struct EntityOutcome {
    entity: EntityId,
    values: TimeSeries,
    writes: Vec<SeriesWrite>,
    from_store: bool,
}

/// Computes features on demand with write-through caching.
#[derive(Debug, Clone)]
pub struct ComputeEngine {
    registry: Arc<FeatureRegistry>,
    source: Arc<dyn RawSource>,
    store: Arc<dyn FeatureStore>,
    config: EngineConfig,
}

impl ComputeEngine {
    /// Create an engine over a registry, a raw data source and a store.
    pub fn new(
        registry: Arc<FeatureRegistry>,
        source: Arc<dyn RawSource>,
        store: Arc<dyn FeatureStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            source,
            store,
            config,
        }
    }

    /// Feature registry.
    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    /// Feature store.
    pub fn store(&self) -> &Arc<dyn FeatureStore> {
        &self.store
    }

    /// Engine configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compute one feature for every requested entity.
    ///
    /// Returns the feature sliced to the requested range, one column keyed by
    /// the resolved `feature@version`.
    ///
    /// # Errors
    ///
    /// Any failure is returned as [`EngineError::ComputationFailed`] and
    /// leaves the store untouched. Errors are never retried here.
    #[tracing::instrument(
        skip_all,
        fields(feature = %request.feature, version = ?request.version, entities = request.entities.len())
    )]
    pub async fn compute(&self, request: ComputationRequest) -> Result<FeatureTable, EngineError> {
        let feature = request.feature.clone();
        self.execute(request).await.map_err(|cause| {
            warn!(error = %cause, "computation failed");
            EngineError::ComputationFailed { feature, cause }
        })
    }

    async fn execute(&self, request: ComputationRequest) -> Result<FeatureTable, ComputeError> {
        let graph = self
            .registry
            .dependency_graph(&request.feature, request.version)?;
        let target = graph
            .last()
            .map(|definition| definition.key())
            .ok_or_else(|| FeatureError::UnknownFeature {
                name: request.feature.clone(),
                version: request.version,
            })?;

        let range = request.range;
        let entities: BTreeSet<EntityId> = request.entities.into_iter().collect();

        let outcomes: Vec<EntityOutcome> = stream::iter(entities)
            .map(|entity| self.compute_entity(entity, &graph, range))
            .buffer_unordered(self.config.entity_concurrency.max(1))
            .try_collect()
            .await?;

        let mut table = FeatureTable::from_feature(target.clone(), std::iter::empty::<(EntityId, TimeSeries)>());
        let mut batch = WriteBatch::new();
        let mut cache_hits = 0;
        for outcome in outcomes {
            if outcome.from_store {
                cache_hits += 1;
            }
            batch.extend(outcome.writes);
            table.insert(outcome.entity, target.clone(), outcome.values);
        }

        let staged = batch.value_count();
        let written = if batch.is_empty() {
            0
        } else {
            self.with_store_timeout(self.store.commit(batch)).await?
        };

        info!(
            resolved = %target,
            cache_hits,
            staged,
            written,
            rows = table.row_count(),
            "feature computed"
        );
        Ok(table)
    }

    /// Run the graph for one entity, staging writes for every node the store
    /// does not cover yet.
    ///
    /// The graph runs over the entity's whole history and is sliced
    /// afterwards, so a value never depends on the requested window. Stored
    /// coverage stops at the entity's latest market observation.
    async fn compute_entity(
        &self,
        entity: EntityId,
        graph: &[Arc<FeatureDefinition>],
        range: TimeRange,
    ) -> Result<EntityOutcome, ComputeError> {
        let Some((target, dependencies)) = graph.split_last() else {
            return Ok(EntityOutcome {
                entity,
                values: TimeSeries::new(),
                writes: Vec::new(),
                from_store: false,
            });
        };

        let cached = self
            .read(&SeriesKey::for_feature(entity.clone(), &target.key()), &range)
            .await?;
        if cached.is_complete() {
            debug!(entity = %entity, "served from store");
            return Ok(EntityOutcome {
                entity,
                values: cached.values,
                writes: Vec::new(),
                from_store: true,
            });
        }

        let mut stale: HashSet<FeatureKey> = HashSet::from([target.key()]);
        for definition in dependencies {
            let key = SeriesKey::for_feature(entity.clone(), &definition.key());
            if !self.read(&key, &range).await?.is_complete() {
                stale.insert(definition.key());
            }
        }

        let raw = self.fetch(&entity).await?;
        let settled = settled_range(&range, &raw.observations);

        let mut computed: HashMap<FeatureKey, TimeSeries> = HashMap::with_capacity(graph.len());
        let mut writes = Vec::with_capacity(stale.len());
        for definition in graph {
            let key = definition.key();
            let values = self.evaluate(definition, &raw, &computed)?;
            if let Some(settled) = settled.filter(|_| stale.contains(&key)) {
                writes.push(SeriesWrite::new(
                    SeriesKey::for_feature(entity.clone(), &key),
                    settled,
                    values.slice(&settled),
                ));
            }
            computed.insert(key, values);
        }

        debug!(
            entity = %entity,
            reused = graph.len() - stale.len(),
            staged = writes.len(),
            settled = ?settled,
            "entity computed"
        );
        let values = computed
            .remove(&target.key())
            .map(|values| values.slice(&range))
            .unwrap_or_default();
        Ok(EntityOutcome {
            entity,
            values,
            writes,
            from_store: false,
        })
    }

    /// Apply one definition to raw observations and already computed features.
    fn evaluate(
        &self,
        definition: &FeatureDefinition,
        raw: &FetchOutcome,
        computed: &HashMap<FeatureKey, TimeSeries>,
    ) -> Result<TimeSeries, ComputeError> {
        let mut inputs = Vec::with_capacity(definition.dependencies().len());
        for dependency in definition.dependencies() {
            let series = match dependency {
                Dependency::Raw { kind } => TimeSeries::from_observations(&raw.observations, *kind),
                Dependency::Feature { name, version } => {
                    let key = self.registry.resolve(name, *version)?.key();
                    computed
                        .get(&key)
                        .cloned()
                        .ok_or_else(|| FeatureError::UnknownFeature {
                            name: name.clone(),
                            version: Some(key.version),
                        })?
                }
            };
            inputs.push(series);
        }

        let inputs: Vec<&TimeSeries> = inputs.iter().collect();
        Ok(definition.transformation().apply(&inputs)?)
    }

    /// Fetch every observation the source has for `entity`.
    async fn fetch(&self, entity: &EntityId) -> Result<FetchOutcome, ComputeError> {
        let timeout = self.config.fetch_timeout();
        let history = TimeRange::unbounded();
        let outcome = tokio::time::timeout(timeout, self.source.fetch(entity, &history))
            .await
            .map_err(|_| {
                DataError::unavailable(
                    entity.as_str(),
                    format!("{} did not answer within {timeout:?}", self.source.name()),
                )
            })??;

        check_integrity(entity, &outcome.observations)?;
        debug!(
            entity = %entity,
            source = self.source.name(),
            observations = outcome.observations.len(),
            skipped = outcome.warnings.len(),
            "fetched raw observations"
        );
        Ok(outcome)
    }

    async fn read(&self, key: &SeriesKey, range: &TimeRange) -> Result<CachedSeries, ComputeError> {
        self.with_store_timeout(self.store.get(key, range)).await
    }

    async fn with_store_timeout<T, F>(&self, operation: F) -> Result<T, ComputeError>
    where
        F: Future<Output = strata_store::Result<T>>,
    {
        let timeout = self.config.store_timeout();
        let result = tokio::time::timeout(timeout, operation).await.map_err(|_| {
            StoreError::CacheUnavailable(format!("store did not answer within {timeout:?}"))
        })?;
        Ok(result?)
    }
}

/// Part of `range` whose values can no longer change without a revision of
/// past data: up to the latest price or volume, or the latest event when
/// there is neither.
fn settled_range(range: &TimeRange, observations: &[RawObservation]) -> Option<TimeRange> {
    let latest = |events: bool| {
        observations
            .iter()
            .filter(|observation| events || !observation.kind.is_event())
            .map(|observation| observation.timestamp)
            .max()
    };
    latest(false)
        .or_else(|| latest(true))
        .and_then(|latest| range.truncate_end(latest))
}

/// Reject observations of another entity and duplicate `(timestamp, kind)` pairs.
fn check_integrity(entity: &EntityId, observations: &[RawObservation]) -> Result<(), ComputeError> {
    let mut seen: HashSet<(DateTime<Utc>, ObservationKind)> = HashSet::with_capacity(observations.len());
    for observation in observations {
        if &observation.entity != entity {
            return Err(ComputeError::DataIntegrity {
                entity: entity.to_string(),
                reason: format!("source returned an observation for {}", observation.entity),
            });
        }
        if !seen.insert((observation.timestamp, observation.kind)) {
            return Err(ComputeError::DataIntegrity {
                entity: entity.to_string(),
                reason: format!(
                    "duplicate {} observation at {}",
                    observation.kind,
                    observation.timestamp.to_rfc3339()
                ),
            });
        }
    }
    Ok(())
}
