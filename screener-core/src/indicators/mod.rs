//! Indicator engine: pure transforms over the close and volume columns.
//!
//! Undefined values are `f64::NAN` in output series and `None` for scalar
//! results. Short input is never an error: it just yields undefined values.

pub mod crossover;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod volume;

pub use crossover::{cross_above_within, cross_below_within, Cross};
pub use ema::{ema_of_series, Ema};
pub use macd::{Macd, MacdSeries};
pub use rsi::{rsi_of_series, Rsi};
pub use volume::{volume_spike, VolumeSpike, VOLUME_BASELINE_BARS};

use crate::domain::Bar;

/// Trait for single-series indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. The first `lookback()` values are `f64::NAN` (warmup).
///
/// No value at bar t may depend on bars after t: computing over a truncated
/// series must reproduce the prefix of the full computation.
pub trait Indicator: Send + Sync {
    /// Name used as the diagnostic key, e.g. `"ema_20"`.
    fn name(&self) -> &str;

    /// Number of bars before the output becomes defined.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Last element of a series, if present and defined.
pub fn latest_defined(values: &[f64]) -> Option<f64> {
    values.last().copied().filter(|v| v.is_finite())
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high/low one point either
/// side, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
