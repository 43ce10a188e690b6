//! Store keys, write batches and read results.

use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use strata_data::{EntityId, TimeRange};
use strata_features::{FeatureKey, TimeSeries};

/// `(entity, feature, version)` identifying one stored series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    /// Entity identifier
    pub entity: EntityId,
    /// Feature name
    pub feature: String,
    /// Feature version
    pub version: u32,
}

impl SeriesKey {
    /// Create a new key.
    pub fn new(entity: EntityId, feature: impl Into<String>, version: u32) -> Self {
        Self {
            entity,
            feature: feature.into(),
            version,
        }
    }

    /// Key of a feature definition for one entity.
    pub fn for_feature(entity: EntityId, key: &FeatureKey) -> Self {
        Self::new(entity, key.name.clone(), key.version)
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.entity, self.feature, self.version)
    }
}

/// One stored value, `None` being the explicit missing marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureValue {
    /// Series the value belongs to
    pub key: SeriesKey,
    /// Observation timestamp
    pub timestamp: DateTime<Utc>,
    /// Value
    pub value: Option<f64>,
}

/// Values of one series together with the range the computation covered.
///
/// `covered` may be wider than the span of `values`: a computation over a
/// range with no observations still records that nothing exists there.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesWrite {
    /// Target series
    pub key: SeriesKey,
    /// Range the values are complete for
    pub covered: TimeRange,
    /// Values to write
    pub values: TimeSeries,
}

impl SeriesWrite {
    /// Create a new write.
    pub const fn new(key: SeriesKey, covered: TimeRange, values: TimeSeries) -> Self {
        Self {
            key,
            covered,
            values,
        }
    }
}

/// Writes committed together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<SeriesWrite>,
}

impl WriteBatch {
    /// Empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch of one write.
    pub fn single(write: SeriesWrite) -> Self {
        Self {
            writes: vec![write],
        }
    }

    /// Stage a write.
    pub fn push(&mut self, write: SeriesWrite) {
        self.writes.push(write);
    }

    /// Staged writes.
    pub fn writes(&self) -> &[SeriesWrite] {
        &self.writes
    }

    /// Number of staged series.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Total number of staged values.
    pub fn value_count(&self) -> usize {
        self.writes.iter().map(|w| w.values.len()).sum()
    }
}

impl Extend<SeriesWrite> for WriteBatch {
    fn extend<T: IntoIterator<Item = SeriesWrite>>(&mut self, iter: T) {
        self.writes.extend(iter);
    }
}

impl IntoIterator for WriteBatch {
    type Item = SeriesWrite;
    type IntoIter = std::vec::IntoIter<SeriesWrite>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

/// Result of a range read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedSeries {
    /// Stored values inside the requested range
    pub values: TimeSeries,
    /// Sub-ranges no commit has covered, in ascending order
    pub missing: Vec<TimeRange>,
}

impl CachedSeries {
    /// Whether the requested range is fully covered.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of distinct series
    pub series: usize,
    /// Number of stored values
    pub values: usize,
    /// Values written by commits since the store was opened, no-ops excluded
    pub writes: usize,
}

/// Whether a stored and an incoming value are the same.
///
/// Values are compared exactly; both missing counts as equal.
pub(crate) fn same_value(existing: Option<f64>, attempted: Option<f64>) -> bool {
    match (existing, attempted) {
        (None, None) => true,
        (Some(a), Some(b)) => a.to_bits() == b.to_bits() || a == b,
        _ => false,
    }
}

/// Values of `batch` that are not stored yet.
///
/// `stored` looks up committed values. Identical rewrites are dropped and a
/// differing value, whether committed or staged earlier in the same batch,
/// fails the whole batch.
pub(crate) fn plan_writes<F>(batch: &WriteBatch, mut stored: F) -> Result<Vec<FeatureValue>>
where
    F: FnMut(&SeriesKey, DateTime<Utc>) -> Result<Option<Option<f64>>>,
{
    let mut staged: HashMap<(&SeriesKey, DateTime<Utc>), Option<f64>> = HashMap::new();
    let mut pending = Vec::new();

    for write in batch.writes() {
        for (timestamp, value) in write.values.iter() {
            let existing = match staged.get(&(&write.key, timestamp)) {
                Some(staged) => Some(*staged),
                None => stored(&write.key, timestamp)?,
            };
            match existing {
                Some(existing) if same_value(existing, value) => {}
                Some(existing) => {
                    return Err(StoreError::CacheConflict {
                        entity: write.key.entity.to_string(),
                        feature: write.key.feature.clone(),
                        version: write.key.version,
                        timestamp,
                        existing,
                        attempted: value,
                    });
                }
                None => {
                    staged.insert((&write.key, timestamp), value);
                    pending.push(FeatureValue {
                        key: write.key.clone(),
                        timestamp,
                        value,
                    });
                }
            }
        }
    }
    Ok(pending)
}
