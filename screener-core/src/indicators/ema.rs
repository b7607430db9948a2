//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (span + 1).
//! Seed: EMA = x at the first defined input; leading NaN stays NaN.
//! Lookback: 0 on a clean series.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    span: usize,
    name: String,
}

impl Ema {
    pub fn new(span: usize) -> Self {
        assert!(span >= 1, "EMA span must be >= 1");
        Self {
            span,
            name: format!("ema_{span}"),
        }
    }

    pub fn span(&self) -> usize {
        self.span
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        ema_of_series(&closes, self.span)
    }
}

/// EMA of an arbitrary series; also used for the MACD signal line.
pub fn ema_of_series(values: &[f64], span: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if span == 0 {
        return result;
    }

    let Some(seed_idx) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut prev = values[seed_idx];
    result[seed_idx] = prev;

    for i in (seed_idx + 1)..n {
        if values[i].is_nan() {
            // Tainted from here on.
            return result;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }

    result
}
