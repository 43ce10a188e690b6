//! Source selection and argument parsing for `strata compute`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::path::Path;
use std::sync::Arc;
use strata_data::{DataError, MemorySource, RawSource, TimeRange, YahooSource};
use tracing::info;

/// Raw data source: a JSON file when given, Yahoo Finance otherwise.
pub(crate) fn open_source(input: Option<&Path>) -> Result<Arc<dyn RawSource>, DataError> {
    match input {
        Some(path) => {
            let payload = std::fs::read_to_string(path)?;
            let source = MemorySource::from_json(&payload)?;
            info!(path = %path.display(), records = source.len(), "loaded raw records");
            Ok(Arc::new(source))
        }
        None => Ok(Arc::new(YahooSource::new()?)),
    }
}

/// Parse `YYYY-MM-DD` or RFC 3339.
///
/// A bare date means the start of that day, or its last second when
/// `end_of_day` is set, so date ranges stay inclusive.
pub(crate) fn parse_time(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{value}': {e}"))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        Some(NaiveTime::MIN)
    }
    .ok_or_else(|| format!("invalid time for '{value}'"))?;
    Ok(date.and_time(time).and_utc())
}

/// Inclusive range from command line bounds.
pub(crate) fn parse_range(start: &str, end: &str) -> Result<TimeRange, String> {
    let start = parse_time(start, false)?;
    let end = parse_time(end, true)?;
    TimeRange::new(start, end).map_err(|e| e.to_string())
}

/// Split comma separated arguments, dropping blanks.
pub(crate) fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
