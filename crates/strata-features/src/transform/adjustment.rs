//! Corporate-action adjustment factors.
//!
//! Both factors are accumulated in reverse chronological order starting from
//! the latest price, so the most recent factor is always 1. Events stamped
//! after the latest price would only rescale the whole series and are
//! ignored. An event stamped on a price date affects prices strictly before
//! it: the price on the ex-date already trades ex-event.

use crate::series::TimeSeries;
use chrono::{DateTime, Utc};

/// Per-event multiplier, `None` when the event cannot be applied.
type EventFactor = (DateTime<Utc>, Option<f64>);

/// Accumulate event multipliers backwards over the price index.
///
/// Once an unusable event is crossed every earlier factor is missing.
fn accumulate(prices: &TimeSeries, mut events: Vec<EventFactor>) -> TimeSeries {
    let Some(latest) = prices.last_timestamp() else {
        return TimeSeries::new();
    };
    events.retain(|(ex_date, _)| *ex_date <= latest);
    events.sort_by(|a, b| b.0.cmp(&a.0));

    let mut output = TimeSeries::new();
    let mut pending = events.into_iter().peekable();
    let mut cumulative = Some(1.0);

    for ts in prices.timestamps().rev() {
        while let Some((_, factor)) = pending.next_if(|(ex_date, _)| *ex_date > ts) {
            cumulative = match (cumulative, factor) {
                (Some(acc), Some(f)) => Some(acc * f),
                _ => None,
            };
        }
        output.insert(ts, cumulative);
    }
    output
}

/// Dividend adjustment factor over the price index.
///
/// Each dividend `d` with ex-date `e` is paired with the price observation
/// immediately preceding `e` and contributes `1 - d / price` to every
/// timestamp before `e`. A dividend with no usable preceding price (absent,
/// missing, non-positive, or a factor that is not positive) makes every
/// earlier factor missing.
pub fn dividend_factor(prices: &TimeSeries, dividends: &TimeSeries) -> TimeSeries {
    let events = dividends
        .iter()
        .map(|(ex_date, amount)| {
            let prior = prices.last_before(ex_date).and_then(|(_, p)| p);
            let factor = match (amount, prior) {
                (Some(amount), Some(price)) if price > 0.0 => {
                    Some(1.0 - amount / price).filter(|f| f.is_finite() && *f > 0.0)
                }
                _ => None,
            };
            (ex_date, factor)
        })
        .collect();

    accumulate(prices, events)
}

/// Split adjustment factor over the price index.
///
/// A split of ratio `r` (new shares per old share) contributes `1 / r` to
/// every timestamp before its ex-date. A missing or non-positive ratio makes
/// every earlier factor missing.
pub fn split_factor(prices: &TimeSeries, splits: &TimeSeries) -> TimeSeries {
    let events = splits
        .iter()
        .map(|(ex_date, ratio)| {
            let factor = ratio.filter(|r| *r > 0.0).map(|r| 1.0 / r);
            (ex_date, factor)
        })
        .collect();

    accumulate(prices, events)
}
