//! Normalizations over the whole input series.
//!
//! Statistics are taken over every present value of the input, which the
//! engine evaluates over an entity's full history; missing points stay
//! missing.

use crate::series::TimeSeries;

/// Scale present values into `[0, 1]`.
///
/// A constant series has no spread and comes out missing.
pub fn min_max(input: &TimeSeries) -> TimeSeries {
    let (min, max) = input
        .present()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| {
            (lo.min(v), hi.max(v))
        });
    let spread = max - min;

    input
        .iter()
        .map(|(ts, v)| (ts, v.map(|v| (v - min) / spread)))
        .collect()
}

/// Standard score using the sample standard deviation.
///
/// Fewer than two present values, or zero deviation, yields missing values.
pub fn z_score(input: &TimeSeries) -> TimeSeries {
    let values: Vec<f64> = input.present().map(|(_, v)| v).collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = variance.sqrt();

    input
        .iter()
        .map(|(ts, v)| (ts, v.map(|v| (v - mean) / std)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_min_max() {
        let series = TimeSeries::from_points([
            (ts(1), Some(10.0)),
            (ts(2), None),
            (ts(3), Some(20.0)),
            (ts(4), Some(15.0)),
        ]);
        let scaled = min_max(&series);

        assert_relative_eq!(scaled.value_at(ts(1)).unwrap(), 0.0);
        assert_relative_eq!(scaled.value_at(ts(3)).unwrap(), 1.0);
        assert_relative_eq!(scaled.value_at(ts(4)).unwrap(), 0.5);
        assert_eq!(scaled.get(ts(2)), Some(None));
    }

    #[test]
    fn test_min_max_constant_series() {
        let series = TimeSeries::from_values([(ts(1), 5.0), (ts(2), 5.0)]);
        assert_eq!(min_max(&series).missing_count(), 2);
    }

    #[test]
    fn test_z_score() {
        let series = TimeSeries::from_values([(ts(1), 1.0), (ts(2), 2.0), (ts(3), 3.0)]);
        let scores = z_score(&series);

        assert_relative_eq!(scores.value_at(ts(1)).unwrap(), -1.0);
        assert_relative_eq!(scores.value_at(ts(2)).unwrap(), 0.0);
        assert_relative_eq!(scores.value_at(ts(3)).unwrap(), 1.0);
    }

    #[test]
    fn test_z_score_single_value() {
        let series = TimeSeries::from_values([(ts(1), 1.0)]);
        assert_eq!(z_score(&series).get(ts(1)), Some(None));
    }
}
