//! Time-indexed series with explicit missing markers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strata_data::{ObservationKind, RawObservation, TimeRange};

/// Ordered series of `timestamp -> value`, where `None` marks a missing value.
///
/// Non-finite values are never stored; inserting one records a missing
/// marker instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    points: BTreeMap<DateTime<Utc>, Option<f64>>,
}

impl TimeSeries {
    /// Create an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from `(timestamp, value)` pairs.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, Option<f64>)>,
    {
        let mut series = Self::new();
        for (ts, value) in points {
            series.insert(ts, value);
        }
        series
    }

    /// Build a series of present values.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, f64)>,
    {
        Self::from_points(values.into_iter().map(|(ts, v)| (ts, Some(v))))
    }

    /// Series of one observation kind taken from normalized observations.
    pub fn from_observations<'a, I>(observations: I, kind: ObservationKind) -> Self
    where
        I: IntoIterator<Item = &'a RawObservation>,
    {
        Self::from_values(
            observations
                .into_iter()
                .filter(|o| o.kind == kind)
                .map(|o| (o.timestamp, o.value)),
        )
    }

    /// Insert a value, replacing any previous value at `ts`.
    pub fn insert(&mut self, ts: DateTime<Utc>, value: Option<f64>) {
        self.points.insert(ts, value.filter(|v| v.is_finite()));
    }

    /// Point at `ts`: `None` if absent, `Some(None)` if present but missing.
    pub fn get(&self, ts: DateTime<Utc>) -> Option<Option<f64>> {
        self.points.get(&ts).copied()
    }

    /// Present value at `ts`.
    pub fn value_at(&self, ts: DateTime<Utc>) -> Option<f64> {
        self.get(ts).flatten()
    }

    /// Number of points (missing included).
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of missing markers.
    pub fn missing_count(&self) -> usize {
        self.points.values().filter(|v| v.is_none()).count()
    }

    /// Points in timestamp order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (DateTime<Utc>, Option<f64>)> + '_ {
        self.points.iter().map(|(ts, v)| (*ts, *v))
    }

    /// Present values in timestamp order.
    pub fn present(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|(ts, v)| v.map(|v| (*ts, v)))
    }

    /// Timestamps in order.
    pub fn timestamps(&self) -> impl DoubleEndedIterator<Item = DateTime<Utc>> + '_ {
        self.points.keys().copied()
    }

    /// Earliest timestamp.
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.keys().next().copied()
    }

    /// Latest timestamp.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.keys().next_back().copied()
    }

    /// Last point strictly before `ts`.
    pub fn last_before(&self, ts: DateTime<Utc>) -> Option<(DateTime<Utc>, Option<f64>)> {
        self.points.range(..ts).next_back().map(|(t, v)| (*t, *v))
    }

    /// Points inside `range`.
    pub fn slice(&self, range: &TimeRange) -> Self {
        Self {
            points: self
                .points
                .range(range.start()..=range.end())
                .map(|(ts, v)| (*ts, *v))
                .collect(),
        }
    }

    /// Merge `other` into `self`; points of `other` win on equal timestamps.
    pub fn extend(&mut self, other: &Self) {
        for (ts, value) in other.iter() {
            self.insert(ts, value);
        }
    }
}

impl FromIterator<(DateTime<Utc>, Option<f64>)> for TimeSeries {
    fn from_iter<T: IntoIterator<Item = (DateTime<Utc>, Option<f64>)>>(iter: T) -> Self {
        Self::from_points(iter)
    }
}

/// Union of the timestamps of every series (outer join index).
pub fn aligned_index<'a, I>(series: I) -> BTreeSet<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a TimeSeries>,
{
    series
        .into_iter()
        .flat_map(|s| s.points.keys().copied())
        .collect()
}
