//! Raw data source adapters.
//!
//! Upstreams deliver loosely-typed records. [`normalize_records`] turns them
//! into the canonical form every [`RawSource`] must return: observations for
//! one entity, inside the requested range, sorted by timestamp ascending and
//! deduplicated by `(entity, timestamp, kind)`.

pub mod json;
pub mod memory;

pub use json::JsonRecords;
pub use memory::MemorySource;

use crate::error::{MalformedRecord, Result};
use crate::observation::{EntityId, ObservationKind, RawObservation, TimeRange};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A record as delivered by an upstream, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamRecord {
    /// Entity identifier
    pub entity: Option<String>,
    /// Observation time
    pub timestamp: Option<DateTime<Utc>>,
    /// Observation kind, as named by the upstream
    pub kind: Option<String>,
    /// Observed value
    pub value: Option<f64>,
}

impl UpstreamRecord {
    /// Build a complete record.
    pub fn new(
        entity: impl Into<String>,
        timestamp: DateTime<Utc>,
        kind: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            entity: Some(entity.into()),
            timestamp: Some(timestamp),
            kind: Some(kind.into()),
            value: Some(value),
        }
    }
}

impl From<&RawObservation> for UpstreamRecord {
    fn from(obs: &RawObservation) -> Self {
        Self::new(
            obs.entity.as_str(),
            obs.timestamp,
            obs.kind.as_str(),
            obs.value,
        )
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    /// Normalized observations, sorted by timestamp ascending
    pub observations: Vec<RawObservation>,
    /// Records that were skipped
    pub warnings: Vec<MalformedRecord>,
}

impl FetchOutcome {
    /// Observations of a single kind, in timestamp order.
    pub fn of_kind(&self, kind: ObservationKind) -> impl Iterator<Item = &RawObservation> {
        self.observations.iter().filter(move |o| o.kind == kind)
    }

    /// Whether nothing was returned.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Capability to fetch raw observations for an entity.
#[async_trait]
pub trait RawSource: std::fmt::Debug + Send + Sync {
    /// Short name of the source, used in logs.
    fn name(&self) -> &str;

    /// Fetch observations for `entity` inside `range`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SourceUnavailable`](crate::DataError::SourceUnavailable)
    /// if the upstream cannot be reached. Malformed records are reported in
    /// [`FetchOutcome::warnings`] rather than as an error.
    async fn fetch(&self, entity: &EntityId, range: &TimeRange) -> Result<FetchOutcome>;
}

fn validate(
    index: usize,
    record: &UpstreamRecord,
) -> std::result::Result<RawObservation, MalformedRecord> {
    let entity = record
        .entity
        .as_deref()
        .ok_or_else(|| MalformedRecord::new(index, "missing entity"))
        .and_then(|e| EntityId::new(e).map_err(|e| MalformedRecord::new(index, e.to_string())))?;
    let timestamp = record
        .timestamp
        .ok_or_else(|| MalformedRecord::new(index, "missing or invalid timestamp"))?;
    let kind = record
        .kind
        .as_deref()
        .ok_or_else(|| MalformedRecord::new(index, "missing kind"))?
        .parse::<ObservationKind>()
        .map_err(|e| MalformedRecord::new(index, e.to_string()))?;
    let value = record
        .value
        .ok_or_else(|| MalformedRecord::new(index, "missing value"))?;
    if !value.is_finite() {
        return Err(MalformedRecord::new(index, format!("non-finite value {value}")));
    }

    Ok(RawObservation::new(entity, timestamp, kind, value))
}

/// Normalize upstream records for one entity and range.
///
/// Records for other entities or outside the range are ignored. Malformed
/// records are skipped, logged and returned as warnings. When several records
/// share `(timestamp, kind)` the one appearing last wins.
pub fn normalize_records<'a, I>(entity: &EntityId, range: &TimeRange, records: I) -> FetchOutcome
where
    I: IntoIterator<Item = &'a UpstreamRecord>,
{
    let mut deduped: BTreeMap<(DateTime<Utc>, ObservationKind), RawObservation> = BTreeMap::new();
    let mut warnings = Vec::new();

    for (index, record) in records.into_iter().enumerate() {
        // Records that name a different entity are simply not ours.
        if record
            .entity
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty() && e.trim() != entity.as_str())
        {
            continue;
        }

        match validate(index, record) {
            Ok(obs) if range.contains(obs.timestamp) => {
                deduped.insert((obs.timestamp, obs.kind), obs);
            }
            Ok(_) => {}
            Err(malformed) => {
                warn!(entity = %entity, index, reason = %malformed.reason, "skipping malformed record");
                warnings.push(malformed);
            }
        }
    }

    FetchOutcome {
        observations: deduped.into_values().collect(),
        warnings,
    }
}
