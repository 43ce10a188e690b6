//! Canonical time-series representation of raw observations.

use crate::error::{DataError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of the subject of a time series (e.g. a ticker symbol).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an entity identifier, rejecting empty or blank ids.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DataError::InvalidEntity("Empty entity".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Kind of a raw observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    /// Closing price
    Price,
    /// Traded volume
    Volume,
    /// Cash dividend per share, stamped on its ex-date
    Dividend,
    /// Split ratio (new shares per old share), stamped on its ex-date
    Split,
}

impl ObservationKind {
    /// All observation kinds.
    pub const ALL: [Self; 4] = [Self::Price, Self::Volume, Self::Dividend, Self::Split];

    /// Canonical lowercase name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Volume => "volume",
            Self::Dividend => "dividend",
            Self::Split => "split",
        }
    }

    /// Whether the kind is a corporate-action event rather than a regular
    /// market observation.
    pub const fn is_event(&self) -> bool {
        matches!(self, Self::Dividend | Self::Split)
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObservationKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "price" | "close" => Ok(Self::Price),
            "volume" => Ok(Self::Volume),
            "dividend" | "div" | "dividends" => Ok(Self::Dividend),
            "split" | "splits" | "split_ratio" => Ok(Self::Split),
            other => Err(DataError::UnknownKind(other.to_string())),
        }
    }
}

/// A single normalized observation. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    /// Entity the observation belongs to
    pub entity: EntityId,
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Observation kind
    pub kind: ObservationKind,
    /// Observed value
    pub value: f64,
}

impl RawObservation {
    /// Create a new observation.
    pub const fn new(
        entity: EntityId,
        timestamp: DateTime<Utc>,
        kind: ObservationKind,
        value: f64,
    ) -> Self {
        Self {
            entity,
            timestamp,
            kind,
            value,
        }
    }
}

/// Inclusive time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawTimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = DataError;

    fn try_from(raw: RawTimeRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl TimeRange {
    /// Create a range, failing if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(DataError::InvalidTimeRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Range covering every representable instant, used to ask a source for
    /// all the history it has.
    pub const fn unbounded() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Range with the same start ending at `end` at the latest, `None` when
    /// that leaves nothing.
    pub fn truncate_end(&self, end: DateTime<Utc>) -> Option<Self> {
        (self.start <= end).then(|| Self {
            start: self.start,
            end: self.end.min(end),
        })
    }

    /// Range covering a single instant.
    pub const fn instant(at: DateTime<Utc>) -> Self {
        Self { start: at, end: at }
    }

    /// Start of the range (inclusive).
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the range (inclusive).
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `ts` falls inside the range.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// Whether `other` lies entirely inside this range.
    pub fn covers(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
