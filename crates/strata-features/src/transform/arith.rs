//! Element-wise arithmetic over aligned series.

use crate::series::{TimeSeries, aligned_index};

/// Product of all inputs on their outer-joined index.
///
/// A timestamp absent from, or missing in, any input is missing in the output.
pub fn product(inputs: &[&TimeSeries]) -> TimeSeries {
    aligned_index(inputs.iter().copied())
        .into_iter()
        .map(|ts| {
            let value = inputs
                .iter()
                .map(|s| s.value_at(ts))
                .try_fold(1.0, |acc, v| v.map(|v| acc * v));
            (ts, value)
        })
        .collect()
}
