//! Covered time ranges of a stored series.

use chrono::{DateTime, Duration, Utc};
use strata_data::TimeRange;

/// Smallest timestamp step; adjacent ranges closer than this are merged.
const TICK: Duration = Duration::nanoseconds(1);

/// Sorted set of disjoint, non-adjacent inclusive ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    ranges: Vec<TimeRange>,
}

impl Coverage {
    /// Empty coverage.
    pub const fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Coverage built from arbitrary ranges.
    pub fn from_ranges<I: IntoIterator<Item = TimeRange>>(ranges: I) -> Self {
        let mut coverage = Self::new();
        for range in ranges {
            coverage.insert(range);
        }
        coverage
    }

    /// Covered ranges in ascending order.
    pub fn ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    /// Whether nothing is covered.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Add a range, merging it with overlapping or adjacent ones.
    pub fn insert(&mut self, range: TimeRange) {
        let mut start = range.start();
        let mut end = range.end();
        let mut merged = Vec::with_capacity(self.ranges.len() + 1);

        for existing in self.ranges.drain(..) {
            if touches(&existing, start, end) {
                start = start.min(existing.start());
                end = end.max(existing.end());
            } else {
                merged.push(existing);
            }
        }
        let at = merged.partition_point(|r| r.start() < start);
        merged.insert(at, span(start, end));
        self.ranges = merged;
    }

    /// Whether `range` is entirely covered.
    pub fn covers(&self, range: &TimeRange) -> bool {
        self.ranges.iter().any(|r| r.covers(range))
    }

    /// Sub-ranges of `range` not covered, in ascending order.
    pub fn missing(&self, range: &TimeRange) -> Vec<TimeRange> {
        let mut gaps = Vec::new();
        let mut cursor = Some(range.start());

        for covered in &self.ranges {
            let Some(from) = cursor else { break };
            if covered.end() < from {
                continue;
            }
            if covered.start() > range.end() {
                break;
            }
            if covered.start() > from {
                if let Some(until) = covered.start().checked_sub_signed(TICK) {
                    gaps.push(span(from, until));
                }
            }
            cursor = covered.end().checked_add_signed(TICK);
        }

        if let Some(from) = cursor.filter(|from| *from <= range.end()) {
            gaps.push(span(from, range.end()));
        }
        gaps
    }
}

fn touches(range: &TimeRange, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    let after = range.end().checked_add_signed(TICK).unwrap_or(range.end());
    let before = end.checked_add_signed(TICK).unwrap_or(end);
    range.start() <= before && start <= after
}

/// Range from bounds already known to be ordered.
fn span(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeRange {
    TimeRange::new(start, end).unwrap_or_else(|_| TimeRange::instant(start))
}
