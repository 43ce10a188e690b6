//! Polars conversion of feature tables.

use crate::export::ExportError;
use crate::table::FeatureTable;
use polars::prelude::*;

impl FeatureTable {
    /// Wide `DataFrame` with `entity`, `timestamp` and one `Float64` column
    /// per `feature@version`; missing values are null.
    pub fn to_dataframe(&self) -> Result<DataFrame, ExportError> {
        let mut entities = Vec::new();
        let mut timestamps = Vec::new();
        let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); self.columns().len()];

        for entity in self.entities() {
            for (ts, row) in self.rows(entity) {
                entities.push(entity.to_string());
                timestamps.push(ts.timestamp_millis());
                for (column, value) in values.iter_mut().zip(row) {
                    column.push(value);
                }
            }
        }

        let mut columns: Vec<Column> = vec![
            Series::new("entity".into(), entities).into(),
            Series::new("timestamp".into(), timestamps).into(),
        ];
        for (key, column) in self.columns().iter().zip(values) {
            columns.push(Series::new(key.to_string().into(), column).into());
        }

        let df = DataFrame::new(columns)?
            .lazy()
            .with_column(col("timestamp").cast(DataType::Datetime(TimeUnit::Milliseconds, None)))
            .collect()?;

        Ok(df)
    }
}
