//! In-process feature store.

use crate::coverage::Coverage;
use crate::error::{Result, StoreError};
use crate::key::{CacheStats, CachedSeries, SeriesKey, WriteBatch, plan_writes};
use crate::FeatureStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use strata_data::TimeRange;
use strata_features::TimeSeries;
use tracing::debug;

/// Values and coverage of one series.
#[derive(Debug, Default)]
struct Arena {
    values: BTreeMap<DateTime<Utc>, Option<f64>>,
    coverage: Coverage,
}

/// Feature store kept in memory.
///
/// Every series lives in its own ordered map; commits take the single write
/// lock for validation and application, so writes are serialized.
#[derive(Debug)]
pub struct MemoryStore {
    series: RwLock<HashMap<SeriesKey, Arena>>,
    writes: AtomicUsize,
    available: AtomicBool,
    latency: Option<Duration>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
            available: AtomicBool::new(true),
            latency: None,
        }
    }

    /// Delay every operation by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Simulate the store going away or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Drop every stored series.
    pub fn clear(&self) {
        self.series.write().clear();
    }

    async fn ready(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::CacheUnavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FeatureStore for MemoryStore {
    async fn get(&self, key: &SeriesKey, range: &TimeRange) -> Result<CachedSeries> {
        self.ready().await?;

        let series = self.series.read();
        let Some(arena) = series.get(key) else {
            return Ok(CachedSeries {
                values: TimeSeries::new(),
                missing: vec![*range],
            });
        };
        let values = arena
            .values
            .range(range.start()..=range.end())
            .map(|(ts, v)| (*ts, *v))
            .collect();

        Ok(CachedSeries {
            values,
            missing: arena.coverage.missing(range),
        })
    }

    async fn get_value(
        &self,
        key: &SeriesKey,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Option<f64>>> {
        self.ready().await?;
        Ok(self
            .series
            .read()
            .get(key)
            .and_then(|arena| arena.values.get(&timestamp).copied()))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<usize> {
        self.ready().await?;

        let mut series = self.series.write();
        let pending = plan_writes(&batch, |key, ts| {
            Ok(series.get(key).and_then(|arena| arena.values.get(&ts).copied()))
        })?;

        let written = pending.len();
        for value in pending {
            series
                .entry(value.key)
                .or_default()
                .values
                .insert(value.timestamp, value.value);
        }
        for write in batch {
            series.entry(write.key).or_default().coverage.insert(write.covered);
        }
        drop(series);

        self.writes.fetch_add(written, Ordering::SeqCst);
        debug!(written, "committed batch to memory store");
        Ok(written)
    }

    async fn stats(&self) -> Result<CacheStats> {
        self.ready().await?;
        let series = self.series.read();
        Ok(CacheStats {
            series: series.len(),
            values: series.values().map(|arena| arena.values.len()).sum(),
            writes: self.writes.load(Ordering::SeqCst),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::SeriesWrite;
    use chrono::TimeZone;
    use strata_data::EntityId;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn key(feature: &str, version: u32) -> SeriesKey {
        SeriesKey::new(EntityId::new("AAPL").unwrap(), feature, version)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryStore::new();
        let mut values = TimeSeries::from_values([(ts(1), 100.0), (ts(3), 98.0)]);
        values.insert(ts(2), None);

        assert_eq!(store.put(&key("close", 1), &values).await.unwrap(), 3);

        let range = TimeRange::new(ts(1), ts(3)).unwrap();
        let cached = store.get(&key("close", 1), &range).await.unwrap();
        assert!(cached.is_complete());
        assert_eq!(cached.values, values);
        assert_eq!(store.get_value(&key("close", 1), ts(2)).await.unwrap(), Some(None));
        assert_eq!(store.get_value(&key("close", 1), ts(5)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_identical_put_is_noop() {
        let store = MemoryStore::new();
        let values = TimeSeries::from_values([(ts(1), 1.0), (ts(2), 2.0)]);

        store.put(&key("close", 1), &values).await.unwrap();
        assert_eq!(store.put(&key("close", 1), &values).await.unwrap(), 0);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.values, 2);
        assert_eq!(stats.writes, 2);
    }

    #[tokio::test]
    async fn test_conflict_rejects_whole_put() {
        let store = MemoryStore::new();
        store
            .put(&key("close", 1), &TimeSeries::from_values([(ts(2), 2.0)]))
            .await
            .unwrap();

        let rewrite = TimeSeries::from_values([(ts(1), 1.0), (ts(2), 2.5)]);
        let err = store.put(&key("close", 1), &rewrite).await.unwrap_err();
        assert!(matches!(err, StoreError::CacheConflict { attempted: Some(v), .. } if v == 2.5));
        assert_eq!(store.get_value(&key("close", 1), ts(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_versions_are_isolated() {
        let store = MemoryStore::new();
        store
            .put(&key("close", 1), &TimeSeries::from_values([(ts(1), 1.0)]))
            .await
            .unwrap();
        store
            .put(&key("close", 2), &TimeSeries::from_values([(ts(1), 7.0)]))
            .await
            .unwrap();

        assert_eq!(store.get_value(&key("close", 1), ts(1)).await.unwrap(), Some(Some(1.0)));
        assert_eq!(store.get_value(&key("close", 2), ts(1)).await.unwrap(), Some(Some(7.0)));
    }

    #[tokio::test]
    async fn test_commit_records_coverage_beyond_values() {
        let store = MemoryStore::new();
        let covered = TimeRange::new(ts(1), ts(10)).unwrap();
        let write = SeriesWrite::new(
            key("close", 1),
            covered,
            TimeSeries::from_values([(ts(4), 4.0)]),
        );
        store.commit(WriteBatch::single(write)).await.unwrap();

        let cached = store
            .get(&key("close", 1), &TimeRange::new(ts(5), ts(12)).unwrap())
            .await
            .unwrap();
        assert!(cached.values.is_empty());
        assert_eq!(cached.missing.len(), 1);
        assert!(cached.missing[0].start() > ts(10));
        assert_eq!(cached.missing[0].end(), ts(12));
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_store_untouched() {
        let store = MemoryStore::new();
        store
            .put(&key("b", 1), &TimeSeries::from_values([(ts(1), 1.0)]))
            .await
            .unwrap();

        let range = TimeRange::new(ts(1), ts(2)).unwrap();
        let mut batch = WriteBatch::new();
        batch.push(SeriesWrite::new(
            key("a", 1),
            range,
            TimeSeries::from_values([(ts(1), 1.0)]),
        ));
        batch.push(SeriesWrite::new(
            key("b", 1),
            range,
            TimeSeries::from_values([(ts(1), 9.0)]),
        ));
        assert!(store.commit(batch).await.is_err());

        let cached = store.get(&key("a", 1), &range).await.unwrap();
        assert!(cached.values.is_empty());
        assert_eq!(cached.missing, vec![range]);
        assert_eq!(store.stats().await.unwrap().writes, 1);
    }

    #[tokio::test]
    async fn test_offline_store() {
        let store = MemoryStore::new();
        store.set_available(false);
        let err = store.stats().await.unwrap_err();
        assert!(err.is_transient());
    }
}
