//! Relative Strength Index (RSI), simple-average variant.
//!
//! delta[t] = close[t] - close[t-1]; avg_gain and avg_loss are plain means of
//! the gains and losses over the last `period` deltas.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period.
//! Edge cases: avg_loss == 0 → RSI = 100; avg_gain == 0 (with losses) → RSI = 0.

use super::Indicator;
use crate::domain::Bar;

pub const DEFAULT_RSI_PERIOD: usize = 14;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Default for Rsi {
    fn default() -> Self {
        Self::new(DEFAULT_RSI_PERIOD)
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        rsi_of_series(&closes, self.period)
    }
}

pub fn rsi_of_series(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period + 1 {
        return result;
    }

    // changes[i] is the move into bar i; changes[0] is undefined.
    let changes: Vec<f64> = std::iter::once(f64::NAN)
        .chain(closes.windows(2).map(|w| w[1] - w[0]))
        .collect();

    for t in period..n {
        let window = &changes[(t + 1 - period)..=t];
        if window.iter().any(|c| c.is_nan()) {
            continue;
        }
        let avg_gain = window.iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
        let avg_loss = window.iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;
        result[t] = rsi_from_averages(avg_gain, avg_loss);
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
