//! EMA trend-crossover stage: EMA(20) crossing above EMA(50) recently.

use super::{
    below_min_price, latest_close, Decision, Diagnostics, FilterError, FilterStage,
    CROSSOVER_WINDOW, MIN_PRICE,
};
use crate::domain::OhlcvSeries;
use crate::indicators::{cross_above_within, ema_of_series, latest_defined, Cross};

#[derive(Debug, Clone, PartialEq)]
pub struct EmaCrossoverStage {
    pub fast: usize,
    pub slow: usize,
    pub min_price: f64,
}

impl Default for EmaCrossoverStage {
    fn default() -> Self {
        Self {
            fast: 20,
            slow: 50,
            min_price: MIN_PRICE,
        }
    }
}

impl FilterStage for EmaCrossoverStage {
    fn name(&self) -> &str {
        "ema_crossover"
    }

    fn min_bars(&self) -> usize {
        self.slow
    }

    fn evaluate_series(&self, series: &OhlcvSeries) -> Result<Decision, FilterError> {
        let close = latest_close(series)?;
        let closes = series.closes();
        let fast = ema_of_series(&closes, self.fast);
        let slow = ema_of_series(&closes, self.slow);

        let fast_key = format!("ema_{}", self.fast);
        let slow_key = format!("ema_{}", self.slow);
        let fast_now =
            latest_defined(&fast).ok_or_else(|| FilterError::IndicatorUndefined(fast_key.clone()))?;
        let slow_now =
            latest_defined(&slow).ok_or_else(|| FilterError::IndicatorUndefined(slow_key.clone()))?;

        let mut diagnostics = Diagnostics::from([
            ("close".to_string(), close),
            (fast_key, fast_now),
            (slow_key, slow_now),
        ]);

        let cross = cross_above_within(&fast, &slow, CROSSOVER_WINDOW);
        if cross == Cross::Undefined {
            return Err(FilterError::IndicatorUndefined("ema crossover window".into()));
        }
        if let Some(bars_ago) = cross.bars_ago() {
            diagnostics.insert("crossover_bars_ago".into(), bars_ago as f64);
        }

        if let Some(reason) = below_min_price(close, self.min_price) {
            return Ok(Decision::Reject(reason, diagnostics));
        }
        if cross.is_found() {
            Ok(Decision::Pass(diagnostics))
        } else {
            Ok(Decision::Reject(
                format!("no EMA{}/EMA{} cross in last {CROSSOVER_WINDOW} bars", self.fast, self.slow),
                diagnostics,
            ))
        }
    }
}
