//! JSON record payloads.
//!
//! Two layouts are accepted:
//!
//! - a flat array of records:
//!   `[{"entity": "AAPL", "timestamp": 1704067200000, "kind": "price", "value": 100.0}]`
//!   where `timestamp` is epoch milliseconds, an RFC 3339 string or a `YYYY-MM-DD` date
//!   (`symbol` and `type` are accepted as aliases for `entity` and `kind`);
//! - a column-oriented frame per entity, as written by dataframe JSON encoders:
//!   `{"AAPL": {"price": {"1704067200000": 100.0}}}`. The frame may also be nested
//!   as an encoded string under a `dataframe` key.
//!
//! Fields that are absent or cannot be interpreted are left empty so the
//! record surfaces as malformed during normalization instead of aborting the
//! whole payload.

use crate::error::{DataError, Result};
use crate::source::UpstreamRecord;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

/// Parser for JSON record payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRecords;

impl JsonRecords {
    /// Parse a payload into upstream records.
    ///
    /// # Errors
    ///
    /// Fails only when the payload is not JSON or has neither supported layout.
    pub fn parse(payload: &str) -> Result<Vec<UpstreamRecord>> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_value(&value)
    }

    /// Interpret an already-decoded JSON value.
    pub fn from_value(value: &Value) -> Result<Vec<UpstreamRecord>> {
        match value {
            Value::Array(items) => Ok(items.iter().map(record_from_object).collect()),
            Value::Object(entities) => {
                let mut records = Vec::new();
                for (entity, frame) in entities {
                    records.extend(records_from_frame(entity, frame)?);
                }
                Ok(records)
            }
            _ => Err(DataError::Parse(
                "expected an array of records or an object of frames".to_string(),
            )),
        }
    }
}

fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| obj.get(*name))
}

fn record_from_object(item: &Value) -> UpstreamRecord {
    let Some(obj) = item.as_object() else {
        return UpstreamRecord::default();
    };

    UpstreamRecord {
        entity: field(obj, &["entity", "symbol"])
            .and_then(Value::as_str)
            .map(str::to_string),
        timestamp: field(obj, &["timestamp", "date"]).and_then(parse_timestamp),
        kind: field(obj, &["kind", "type"])
            .and_then(Value::as_str)
            .map(str::to_string),
        value: field(obj, &["value"]).and_then(Value::as_f64),
    }
}

fn records_from_frame(entity: &str, frame: &Value) -> Result<Vec<UpstreamRecord>> {
    let columns = match frame {
        Value::Object(obj) => match obj.get("dataframe") {
            Some(Value::String(encoded)) => serde_json::from_str::<Value>(encoded)?,
            Some(nested @ Value::Object(_)) => nested.clone(),
            _ => frame.clone(),
        },
        _ => {
            return Err(DataError::Parse(format!(
                "frame for {entity} is not an object"
            )));
        }
    };

    let Value::Object(columns) = columns else {
        return Err(DataError::Parse(format!(
            "frame for {entity} has no columns"
        )));
    };

    let mut records = Vec::new();
    for (kind, cells) in &columns {
        let Value::Object(cells) = cells else {
            records.push(UpstreamRecord {
                entity: Some(entity.to_string()),
                kind: Some(kind.clone()),
                ..UpstreamRecord::default()
            });
            continue;
        };
        for (index_key, cell) in cells {
            records.push(UpstreamRecord {
                entity: Some(entity.to_string()),
                timestamp: parse_timestamp(&Value::String(index_key.clone())),
                kind: Some(kind.clone()),
                value: cell.as_f64(),
            });
        }
    }
    Ok(records)
}

/// Interpret a JSON value as a timestamp.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::String(s) => {
            if let Ok(millis) = s.parse::<i64>() {
                return DateTime::from_timestamp_millis(millis);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        }
        _ => None,
    }
}
