//! Entity × timestamp × feature tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strata_data::{EntityId, TimeRange};
use strata_features::{FeatureKey, TimeSeries};

/// Feature values for a set of entities.
///
/// Serialized in wide form: per entity, a shared timestamp index and one
/// value array per column, with `null` for missing values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "WideTable", from = "WideTable")]
pub struct FeatureTable {
    columns: Vec<FeatureKey>,
    entities: BTreeMap<EntityId, BTreeMap<FeatureKey, TimeSeries>>,
}

/// One value in long form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Entity identifier
    pub entity: EntityId,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Feature name
    pub feature: String,
    /// Feature version
    pub version: u32,
    /// Value, `None` when missing
    pub value: Option<f64>,
}

impl FeatureTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding one feature column.
    pub fn from_feature<I>(key: FeatureKey, series: I) -> Self
    where
        I: IntoIterator<Item = (EntityId, TimeSeries)>,
    {
        let mut table = Self::new();
        table.add_column(key.clone());
        for (entity, values) in series {
            table.insert(entity, key.clone(), values);
        }
        table
    }

    fn add_column(&mut self, key: FeatureKey) {
        if !self.columns.contains(&key) {
            self.columns.push(key);
        }
    }

    /// Set the series of one entity and column, replacing any previous one.
    pub fn insert(&mut self, entity: EntityId, key: FeatureKey, values: TimeSeries) {
        self.add_column(key.clone());
        self.entities.entry(entity).or_default().insert(key, values);
    }

    /// Outer-join another table's columns into this one.
    pub fn merge(&mut self, other: Self) {
        for key in other.columns {
            self.add_column(key);
        }
        for (entity, columns) in other.entities {
            let target = self.entities.entry(entity).or_default();
            for (key, values) in columns {
                target.entry(key).or_default().extend(&values);
            }
        }
    }

    /// Columns in insertion order.
    pub fn columns(&self) -> &[FeatureKey] {
        &self.columns
    }

    /// Entities in ascending order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityId> {
        self.entities.keys()
    }

    /// Whether the table holds no entity.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Series of one column for one entity.
    pub fn series(&self, entity: &EntityId, key: &FeatureKey) -> Option<&TimeSeries> {
        self.entities.get(entity)?.get(key)
    }

    /// Outer-joined timestamp index of an entity.
    pub fn index(&self, entity: &EntityId) -> BTreeSet<DateTime<Utc>> {
        self.entities
            .get(entity)
            .map(|columns| strata_features::series::aligned_index(columns.values()))
            .unwrap_or_default()
    }

    /// Value at one cell.
    ///
    /// `None` if the entity has no row at `timestamp`; `Some(None)` if the row
    /// exists but the column is missing there.
    pub fn value(
        &self,
        entity: &EntityId,
        key: &FeatureKey,
        timestamp: DateTime<Utc>,
    ) -> Option<Option<f64>> {
        let columns = self.entities.get(entity)?;
        if let Some(value) = columns.get(key).and_then(|s| s.get(timestamp)) {
            return Some(value);
        }
        columns
            .values()
            .any(|s| s.get(timestamp).is_some())
            .then_some(None)
    }

    /// Number of rows over all entities.
    pub fn row_count(&self) -> usize {
        self.entities.keys().map(|e| self.index(e).len()).sum()
    }

    /// Restrict every series to `range`.
    pub fn slice(&self, range: &TimeRange) -> Self {
        let entities = self
            .entities
            .iter()
            .map(|(entity, columns)| {
                let columns = columns
                    .iter()
                    .map(|(key, values)| (key.clone(), values.slice(range)))
                    .collect();
                (entity.clone(), columns)
            })
            .collect();
        Self {
            columns: self.columns.clone(),
            entities,
        }
    }

    /// Rows of one entity: timestamp and one value per column.
    pub fn rows(&self, entity: &EntityId) -> Vec<(DateTime<Utc>, Vec<Option<f64>>)> {
        let Some(columns) = self.entities.get(entity) else {
            return Vec::new();
        };
        self.index(entity)
            .into_iter()
            .map(|ts| {
                let values = self
                    .columns
                    .iter()
                    .map(|key| columns.get(key).and_then(|s| s.get(ts)).flatten())
                    .collect();
                (ts, values)
            })
            .collect()
    }

    /// Every cell in long form, ordered by entity, timestamp and column.
    pub fn records(&self) -> Vec<FeatureRecord> {
        let mut records = Vec::new();
        for entity in self.entities.keys() {
            for (timestamp, values) in self.rows(entity) {
                for (key, value) in self.columns.iter().zip(values) {
                    records.push(FeatureRecord {
                        entity: entity.clone(),
                        timestamp,
                        feature: key.name.clone(),
                        version: key.version,
                        value,
                    });
                }
            }
        }
        records
    }
}

/// Serialized layout of a [`FeatureTable`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WideTable {
    columns: Vec<FeatureKey>,
    entities: BTreeMap<EntityId, WideFrame>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WideFrame {
    timestamps: Vec<DateTime<Utc>>,
    values: BTreeMap<String, Vec<Option<f64>>>,
}

impl From<FeatureTable> for WideTable {
    fn from(table: FeatureTable) -> Self {
        let entities = table
            .entities
            .keys()
            .map(|entity| {
                let rows = table.rows(entity);
                let timestamps = rows.iter().map(|(ts, _)| *ts).collect();
                let values = table
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, key)| (key.to_string(), rows.iter().map(|(_, v)| v[i]).collect()))
                    .collect();
                (entity.clone(), WideFrame { timestamps, values })
            })
            .collect();
        Self {
            columns: table.columns,
            entities,
        }
    }
}

impl From<WideTable> for FeatureTable {
    fn from(wide: WideTable) -> Self {
        let mut table = Self::new();
        for key in &wide.columns {
            table.add_column(key.clone());
        }
        for (entity, frame) in wide.entities {
            for key in &wide.columns {
                let Some(values) = frame.values.get(&key.to_string()) else {
                    continue;
                };
                let series = frame.timestamps.iter().copied().zip(values.iter().copied()).collect();
                table.insert(entity.clone(), key.clone(), series);
            }
        }
        table
    }
}
