//! Moving Average Convergence Divergence (MACD).
//!
//! line = EMA(fast) - EMA(slow); signal = EMA(signal) of the line;
//! histogram = line - signal. Defaults 12 / 26 / 9.

use super::ema::ema_of_series;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
}

/// All three MACD outputs, each the length of the input.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(
            fast >= 1 && slow > fast && signal >= 1,
            "MACD requires 1 <= fast < slow and signal >= 1"
        );
        Self { fast, slow, signal }
    }

    pub fn compute_all(&self, closes: &[f64]) -> MacdSeries {
        let fast = ema_of_series(closes, self.fast);
        let slow = ema_of_series(closes, self.slow);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_of_series(&line, self.signal);
        let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
        MacdSeries {
            line,
            signal,
            histogram,
        }
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

/// As a single-series indicator, MACD is its line.
impl Indicator for Macd {
    fn name(&self) -> &str {
        "macd"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        self.compute_all(&closes).line
    }
}
