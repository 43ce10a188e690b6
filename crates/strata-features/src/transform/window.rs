//! Lagged period-over-period changes.
//!
//! Lags count observations of the input series, not calendar time, so a
//! 15-minute meter reading series yields consumption per interval.

use crate::series::TimeSeries;

fn lagged(input: &TimeSeries, periods: usize, op: impl Fn(f64, f64) -> f64) -> TimeSeries {
    let points: Vec<_> = input.iter().collect();
    points
        .iter()
        .enumerate()
        .map(|(i, (ts, current))| {
            let value = i
                .checked_sub(periods)
                .and_then(|j| points[j].1)
                .zip(*current)
                .map(|(previous, current)| op(current, previous));
            (*ts, value)
        })
        .collect()
}

/// `x[i] - x[i - periods]`; the first `periods` points are missing.
pub fn difference(input: &TimeSeries, periods: usize) -> TimeSeries {
    lagged(input, periods, |current, previous| current - previous)
}

/// `x[i] / x[i - periods] - 1`; the first `periods` points are missing.
pub fn percent_change(input: &TimeSeries, periods: usize) -> TimeSeries {
    lagged(input, periods, |current, previous| current / previous - 1.0)
}
