//! In-process append-only source.

use crate::error::{DataError, Result};
use crate::observation::{EntityId, RawObservation, TimeRange};
use crate::source::{FetchOutcome, JsonRecords, RawSource, UpstreamRecord, normalize_records};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Append-only source backed by records held in memory.
///
/// Records are kept exactly as delivered and normalized on every fetch, so
/// malformed input is reported the same way a remote upstream would report
/// it. The source can be switched offline to simulate an unreachable
/// upstream, and given an artificial latency.
#[derive(Debug, Default)]
pub struct MemorySource {
    records: RwLock<Vec<UpstreamRecord>>,
    offline: AtomicBool,
    latency: Option<Duration>,
    fetches: AtomicUsize,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source seeded with records.
    pub fn with_records(records: Vec<UpstreamRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Self::default()
        }
    }

    /// Create a source from a JSON payload (see [`JsonRecords`]).
    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(Self::with_records(JsonRecords::parse(payload)?))
    }

    /// Delay every fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Append upstream records.
    pub fn ingest(&self, records: impl IntoIterator<Item = UpstreamRecord>) {
        let mut guard = self.records.write();
        let before = guard.len();
        guard.extend(records);
        debug!(appended = guard.len() - before, "ingested records");
    }

    /// Append already-normalized observations.
    pub fn ingest_observations<'a>(
        &self,
        observations: impl IntoIterator<Item = &'a RawObservation>,
    ) {
        self.ingest(observations.into_iter().map(UpstreamRecord::from));
    }

    /// Simulate the upstream going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no records are held.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl RawSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, entity: &EntityId, range: &TimeRange) -> Result<FetchOutcome> {
        if let Some(latency) = self.latency {
            sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(DataError::unavailable(entity.as_str(), "memory source is offline"));
        }

        self.fetches.fetch_add(1, Ordering::SeqCst);
        let records = self.records.read();
        Ok(normalize_records(entity, range, records.iter()))
    }
}
