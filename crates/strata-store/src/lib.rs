#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/strata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod coverage;
pub mod error;
pub mod key;
pub mod memory;
pub mod sqlite;

pub use coverage::Coverage;
pub use error::{Result, StoreError};
pub use key::{CacheStats, CachedSeries, FeatureValue, SeriesKey, SeriesWrite, WriteBatch};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use strata_data::TimeRange;
use strata_features::TimeSeries;

/// Persistent store of computed feature values.
///
/// Implementations serialize writes so that at most one writer commits a
/// given `(entity, feature, version, timestamp)` value.
#[async_trait]
pub trait FeatureStore: std::fmt::Debug + Send + Sync {
    /// Values of a series inside `range`, plus the sub-ranges no commit has covered.
    async fn get(&self, key: &SeriesKey, range: &TimeRange) -> Result<CachedSeries>;

    /// Point lookup: `None` if absent, `Some(None)` for a stored missing marker.
    async fn get_value(&self, key: &SeriesKey, timestamp: DateTime<Utc>)
    -> Result<Option<Option<f64>>>;

    /// Write values of one series, covering the span of their timestamps.
    ///
    /// Returns how many values were newly written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CacheConflict`] if any value differs from one
    /// already committed; nothing is written in that case.
    async fn put(&self, key: &SeriesKey, values: &TimeSeries) -> Result<usize> {
        match (values.first_timestamp(), values.last_timestamp()) {
            (Some(start), Some(end)) => {
                let covered = TimeRange::new(start, end)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                self.commit(WriteBatch::single(SeriesWrite::new(
                    key.clone(),
                    covered,
                    values.clone(),
                )))
                .await
            }
            _ => Ok(0),
        }
    }

    /// Atomically commit several series writes.
    ///
    /// The whole batch is validated before anything is written: either every
    /// value and covered range is recorded, or nothing is.
    async fn commit(&self, batch: WriteBatch) -> Result<usize>;

    /// Store statistics.
    async fn stats(&self) -> Result<CacheStats>;
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
