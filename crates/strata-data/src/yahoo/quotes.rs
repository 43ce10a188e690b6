//! Quote and corporate-action history from Yahoo Finance.

use crate::error::{DataError, Result};
use crate::observation::{EntityId, ObservationKind, TimeRange};
use crate::source::{FetchOutcome, RawSource, UpstreamRecord, normalize_records};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

/// Yahoo Finance source with rate limiting.
///
/// Produces closing prices, volumes, dividends (stamped on the ex-date) and
/// split ratios (`numerator / denominator`).
pub struct YahooSource {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
}

impl std::fmt::Debug for YahooSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooSource")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .finish_non_exhaustive()
    }
}

impl YahooSource {
    /// Create a new Yahoo Finance source with default rate limiting (1 req/sec).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(1000))
    }

    /// Create a new Yahoo Finance source with custom rate limiting.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        let provider = yahoo::YahooConnector::new()
            .map_err(|e| DataError::unavailable("yahoo", e.to_string()))?;
        Ok(Self {
            provider,
            rate_limit_delay,
        })
    }

    fn to_offset(ts: DateTime<Utc>) -> Result<time::OffsetDateTime> {
        time::OffsetDateTime::from_unix_timestamp(ts.timestamp())
            .map_err(|e| DataError::TimeConversion(e.to_string()))
    }

    fn record(
        entity: &EntityId,
        epoch_secs: i64,
        kind: ObservationKind,
        value: f64,
    ) -> UpstreamRecord {
        UpstreamRecord {
            entity: Some(entity.to_string()),
            timestamp: DateTime::from_timestamp(epoch_secs, 0),
            kind: Some(kind.as_str().to_string()),
            value: Some(value),
        }
    }
}

#[async_trait]
impl RawSource for YahooSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch(&self, entity: &EntityId, range: &TimeRange) -> Result<FetchOutcome> {
        // Chart history starts at the epoch and ends now.
        let start = range.start().max(DateTime::<Utc>::UNIX_EPOCH);
        let end = range.end().min(Utc::now());
        if start > end {
            return Ok(FetchOutcome::default());
        }
        let start = Self::to_offset(start)?;
        let end = Self::to_offset(end)?;

        let response = self
            .provider
            .get_quote_history(entity.as_str(), start, end)
            .await
            .map_err(|e| DataError::unavailable(entity.as_str(), e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::unavailable(entity.as_str(), e.to_string()))?;

        let mut records = Vec::with_capacity(quotes.len() * 2);
        for quote in &quotes {
            let ts = quote.timestamp as i64;
            records.push(Self::record(entity, ts, ObservationKind::Price, quote.close));
            records.push(Self::record(
                entity,
                ts,
                ObservationKind::Volume,
                quote.volume as f64,
            ));
        }

        // Corporate actions are optional in the chart payload.
        match response.dividends() {
            Ok(dividends) => {
                for dividend in dividends {
                    records.push(Self::record(
                        entity,
                        dividend.date as i64,
                        ObservationKind::Dividend,
                        dividend.amount as f64,
                    ));
                }
            }
            Err(e) => warn!(entity = %entity, error = %e, "no dividend events in response"),
        }
        match response.splits() {
            Ok(splits) => {
                for split in splits {
                    let ratio = split.numerator as f64 / split.denominator as f64;
                    records.push(Self::record(
                        entity,
                        split.date as i64,
                        ObservationKind::Split,
                        ratio,
                    ));
                }
            }
            Err(e) => warn!(entity = %entity, error = %e, "no split events in response"),
        }

        let outcome = normalize_records(entity, range, &records);
        debug!(
            entity = %entity,
            observations = outcome.observations.len(),
            skipped = outcome.warnings.len(),
            "fetched yahoo history"
        );

        // Apply rate limiting
        sleep(self.rate_limit_delay).await;

        Ok(outcome)
    }
}
