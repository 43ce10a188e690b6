//! SQLite-backed feature store.

use crate::coverage::Coverage;
use crate::error::{Result, StoreError};
use crate::key::{CacheStats, CachedSeries, SeriesKey, WriteBatch, plan_writes};
use crate::FeatureStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use strata_data::TimeRange;
use strata_features::TimeSeries;
use tracing::{debug, info};

/// Feature store persisted in a SQLite database.
///
/// Timestamps are stored as nanoseconds since the Unix epoch and missing
/// values as `NULL`. Each commit runs in one transaction on a blocking
/// worker thread.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    writes: Arc<AtomicUsize>,
}

impl SqliteStore {
    /// Open (or create) a store.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "opened feature store");
        Self::with_connection(conn)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            writes: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Delete every stored value and coverage record.
    ///
    /// Returns the number of values removed.
    pub fn clear_all(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM feature_values", [])?;
        conn.execute("DELETE FROM feature_coverage", [])?;
        Ok(removed)
    }

    /// Delete stored values and coverage of one entity.
    pub fn clear_entity(&self, entity: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM feature_values WHERE entity = ?1", params![entity])?;
        conn.execute("DELETE FROM feature_coverage WHERE entity = ?1", params![entity])?;
        Ok(removed)
    }

    async fn run<T, F>(&self, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            task(&mut conn)
        })
        .await?
    }
}

/// Initialize the database schema.
fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS feature_values (
            entity TEXT NOT NULL,
            feature TEXT NOT NULL,
            version INTEGER NOT NULL,
            ts INTEGER NOT NULL,
            value REAL,
            PRIMARY KEY (entity, feature, version, ts)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS feature_coverage (
            entity TEXT NOT NULL,
            feature TEXT NOT NULL,
            version INTEGER NOT NULL,
            start_ts INTEGER NOT NULL,
            end_ts INTEGER NOT NULL,
            PRIMARY KEY (entity, feature, version, start_ts)
        )",
        [],
    )?;

    Ok(())
}

fn encode_ts(ts: DateTime<Utc>) -> Result<i64> {
    ts.timestamp_nanos_opt()
        .ok_or_else(|| StoreError::Serialization(format!("timestamp out of range: {ts}")))
}

fn decode_ts(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

fn stored_value(
    conn: &Connection,
    key: &SeriesKey,
    ts: DateTime<Utc>,
) -> Result<Option<Option<f64>>> {
    let value = conn
        .query_row(
            "SELECT value FROM feature_values
             WHERE entity = ?1 AND feature = ?2 AND version = ?3 AND ts = ?4",
            params![key.entity.as_str(), key.feature, key.version, encode_ts(ts)?],
            |row| row.get::<_, Option<f64>>(0),
        )
        .optional()?;
    Ok(value)
}

fn load_coverage(conn: &Connection, key: &SeriesKey) -> Result<Coverage> {
    let mut stmt = conn.prepare_cached(
        "SELECT start_ts, end_ts FROM feature_coverage
         WHERE entity = ?1 AND feature = ?2 AND version = ?3",
    )?;
    let rows = stmt.query_map(params![key.entity.as_str(), key.feature, key.version], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut ranges = Vec::new();
    for row in rows {
        let (start, end) = row?;
        let range = TimeRange::new(decode_ts(start), decode_ts(end))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        ranges.push(range);
    }
    Ok(Coverage::from_ranges(ranges))
}

fn save_coverage(conn: &Connection, key: &SeriesKey, coverage: &Coverage) -> Result<()> {
    conn.execute(
        "DELETE FROM feature_coverage WHERE entity = ?1 AND feature = ?2 AND version = ?3",
        params![key.entity.as_str(), key.feature, key.version],
    )?;
    let mut stmt = conn.prepare_cached(
        "INSERT INTO feature_coverage (entity, feature, version, start_ts, end_ts)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for range in coverage.ranges() {
        stmt.execute(params![
            key.entity.as_str(),
            key.feature,
            key.version,
            encode_ts(range.start())?,
            encode_ts(range.end())?,
        ])?;
    }
    Ok(())
}

#[async_trait]
impl FeatureStore for SqliteStore {
    async fn get(&self, key: &SeriesKey, range: &TimeRange) -> Result<CachedSeries> {
        let key = key.clone();
        let range = *range;
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT ts, value FROM feature_values
                 WHERE entity = ?1 AND feature = ?2 AND version = ?3 AND ts BETWEEN ?4 AND ?5
                 ORDER BY ts",
            )?;
            let rows = stmt.query_map(
                params![
                    key.entity.as_str(),
                    key.feature,
                    key.version,
                    encode_ts(range.start())?,
                    encode_ts(range.end())?,
                ],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<f64>>(1)?)),
            )?;

            let mut values = TimeSeries::new();
            for row in rows {
                let (ts, value) = row?;
                values.insert(decode_ts(ts), value);
            }

            let missing = load_coverage(conn, &key)?.missing(&range);
            Ok(CachedSeries { values, missing })
        })
        .await
    }

    async fn get_value(
        &self,
        key: &SeriesKey,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Option<f64>>> {
        let key = key.clone();
        self.run(move |conn| stored_value(conn, &key, timestamp)).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<usize> {
        let written = self
            .run(move |conn| {
                let tx = conn.transaction()?;
                let pending = plan_writes(&batch, |key, ts| stored_value(&tx, key, ts))?;

                {
                    let mut insert = tx.prepare_cached(
                        "INSERT INTO feature_values (entity, feature, version, ts, value)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for value in &pending {
                        insert.execute(params![
                            value.key.entity.as_str(),
                            value.key.feature,
                            value.key.version,
                            encode_ts(value.timestamp)?,
                            value.value,
                        ])?;
                    }
                }

                for write in batch.writes() {
                    let mut coverage = load_coverage(&tx, &write.key)?;
                    coverage.insert(write.covered);
                    save_coverage(&tx, &write.key, &coverage)?;
                }

                tx.commit()?;
                Ok(pending.len())
            })
            .await?;

        self.writes.fetch_add(written, Ordering::SeqCst);
        debug!(written, "committed batch to sqlite store");
        Ok(written)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let (series, values) = self
            .run(|conn| {
                let values: i64 =
                    conn.query_row("SELECT COUNT(*) FROM feature_values", [], |row| row.get(0))?;
                let series: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM (
                        SELECT DISTINCT entity, feature, version FROM feature_coverage
                    )",
                    [],
                    |row| row.get(0),
                )?;
                Ok((series, values))
            })
            .await?;

        Ok(CacheStats {
            series: usize::try_from(series).unwrap_or_default(),
            values: usize::try_from(values).unwrap_or_default(),
            writes: self.writes.load(Ordering::SeqCst),
        })
    }
}
