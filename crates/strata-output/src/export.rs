//! Export of feature tables to CSV and JSON.

use crate::table::{FeatureRecord, FeatureTable};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// DataFrame construction error.
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Comma-separated values format.
    #[default]
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" | "pretty" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn into_string(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

/// Wide CSV: `entity,timestamp,<feature@version>...`, missing cells empty.
impl Exporter for FeatureTable {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                let mut header = vec!["entity".to_string(), "timestamp".to_string()];
                header.extend(self.columns().iter().map(ToString::to_string));
                wtr.write_record(&header)?;

                for entity in self.entities() {
                    for (ts, values) in self.rows(entity) {
                        let mut record = vec![entity.to_string(), ts.to_rfc3339()];
                        record.extend(values.iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()));
                        wtr.write_record(&record)?;
                    }
                }
                into_string(wtr)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

/// Long form: one record per cell.
impl Exporter for Vec<FeatureRecord> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                for record in self {
                    wtr.serialize(record)?;
                }
                into_string(wtr)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rstest::rstest;
    use strata_data::EntityId;
    use strata_features::{FeatureKey, TimeSeries};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn table() -> FeatureTable {
        let mut values = TimeSeries::from_values([(ts(1), 0.98), (ts(3), 1.0)]);
        values.insert(ts(2), None);
        FeatureTable::from_feature(
            FeatureKey::new("dividend_factor", 1),
            [(EntityId::new("AAPL").unwrap(), values)],
        )
    }

    #[test]
    fn test_wide_csv() {
        let csv = table().export_to_string(ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "entity,timestamp,dividend_factor@1");
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with(",0.98"));
        assert!(lines[2].ends_with(','));
    }

    #[test]
    fn test_json_formats() {
        let compact = table().export_to_string(ExportFormat::Json).unwrap();
        let pretty = table().export_to_string(ExportFormat::PrettyJson).unwrap();
        assert!(!compact.contains('\n'));
        assert!(pretty.contains("  "));
        assert!(compact.contains("\"dividend_factor@1\""));
    }

    #[test]
    fn test_long_form_csv() {
        let csv = table().records().export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.starts_with("entity,timestamp,feature,version,value"));
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        table().export_to_file(&path, ExportFormat::Csv).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("AAPL"));
    }

    #[rstest]
    #[case("csv", ExportFormat::Csv)]
    #[case("JSON", ExportFormat::Json)]
    #[case("pretty-json", ExportFormat::PrettyJson)]
    fn test_parse_format(#[case] input: &str, #[case] expected: ExportFormat) {
        assert_eq!(input.parse::<ExportFormat>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!("xml".parse::<ExportFormat>(), Err(ExportError::InvalidFormat(_))));
    }
}
