//! Shared fixtures for engine and query tests.

#![allow(dead_code, unreachable_pub)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use strata::data::{
    DataError, EntityId, FetchOutcome, MemorySource, RawObservation, RawSource, TimeRange,
    UpstreamRecord,
};
use strata::features::FeatureRegistry;
use strata::store::{FeatureStore, MemoryStore};
use strata::{ComputeEngine, EngineConfig};

pub fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

pub fn range(start: u32, end: u32) -> TimeRange {
    TimeRange::new(ts(start), ts(end)).unwrap()
}

pub fn entity(id: &str) -> EntityId {
    EntityId::new(id).unwrap()
}

/// Closes of 100, 102 and 98 on days 1-3 and a dividend of 2 between days 2 and 3.
pub fn dividend_records(id: &str) -> Vec<UpstreamRecord> {
    vec![
        UpstreamRecord::new(id, ts(1), "price", 100.0),
        UpstreamRecord::new(id, ts(2), "price", 102.0),
        UpstreamRecord::new(id, ts(3), "price", 98.0),
        UpstreamRecord::new(id, ts(2) + Duration::hours(12), "dividend", 2.0),
        UpstreamRecord::new(id, ts(1), "volume", 1_000.0),
        UpstreamRecord::new(id, ts(2), "volume", 1_500.0),
    ]
}

pub fn engine_with(
    registry: FeatureRegistry,
    source: Arc<dyn RawSource>,
    store: Arc<dyn FeatureStore>,
    config: EngineConfig,
) -> ComputeEngine {
    ComputeEngine::new(Arc::new(registry), source, store, config)
}

pub fn engine(source: Arc<MemorySource>, store: Arc<MemoryStore>) -> ComputeEngine {
    engine_with(
        FeatureRegistry::with_builtins().unwrap(),
        source,
        store,
        EngineConfig::default(),
    )
}

/// Source that is unreachable for one entity and delegates the rest.
#[derive(Debug)]
pub struct PartialOutage {
    pub inner: MemorySource,
    pub down: EntityId,
}

#[async_trait]
impl RawSource for PartialOutage {
    fn name(&self) -> &str {
        "partial-outage"
    }

    async fn fetch(
        &self,
        entity: &EntityId,
        range: &TimeRange,
    ) -> Result<FetchOutcome, DataError> {
        if entity == &self.down {
            return Err(DataError::unavailable(entity.as_str(), "connection refused"));
        }
        self.inner.fetch(entity, range).await
    }
}

/// Source that returns every observation twice.
#[derive(Debug)]
pub struct Duplicating(pub MemorySource);

#[async_trait]
impl RawSource for Duplicating {
    fn name(&self) -> &str {
        "duplicating"
    }

    async fn fetch(
        &self,
        entity: &EntityId,
        range: &TimeRange,
    ) -> Result<FetchOutcome, DataError> {
        let mut outcome = self.0.fetch(entity, range).await?;
        let copies: Vec<RawObservation> = outcome.observations.clone();
        outcome.observations.extend(copies);
        Ok(outcome)
    }
}
