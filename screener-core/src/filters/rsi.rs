//! RSI momentum stage.
//!
//! Passes when the latest close clears the price floor and the latest RSI(14)
//! is below `threshold + buffer`, i.e. the stock is not overbought.

use super::{below_min_price, latest_close, Decision, Diagnostics, FilterError, FilterStage, MIN_PRICE};
use crate::domain::OhlcvSeries;
use crate::indicators::{latest_defined, rsi_of_series};
use crate::indicators::rsi::DEFAULT_RSI_PERIOD;

#[derive(Debug, Clone, PartialEq)]
pub struct RsiStage {
    pub threshold: f64,
    pub buffer: f64,
    pub min_price: f64,
}

impl RsiStage {
    pub fn new(threshold: f64, buffer: f64, min_price: f64) -> Self {
        Self {
            threshold,
            buffer,
            min_price,
        }
    }
}

impl Default for RsiStage {
    fn default() -> Self {
        Self::new(50.0, 0.0, MIN_PRICE)
    }
}

impl FilterStage for RsiStage {
    fn name(&self) -> &str {
        "rsi"
    }

    fn min_bars(&self) -> usize {
        20
    }

    fn evaluate_series(&self, series: &OhlcvSeries) -> Result<Decision, FilterError> {
        let close = latest_close(series)?;
        let rsi = latest_defined(&rsi_of_series(&series.closes(), DEFAULT_RSI_PERIOD))
            .ok_or_else(|| FilterError::IndicatorUndefined("rsi".into()))?;

        let diagnostics = Diagnostics::from([("close".to_string(), close), ("rsi".to_string(), rsi)]);

        if let Some(reason) = below_min_price(close, self.min_price) {
            return Ok(Decision::Reject(reason, diagnostics));
        }
        let ceiling = self.threshold + self.buffer;
        if rsi < ceiling {
            Ok(Decision::Pass(diagnostics))
        } else {
            Ok(Decision::Reject(
                format!("rsi {rsi:.2} not below {ceiling:.2}"),
                diagnostics,
            ))
        }
    }
}
