//! MACD crossover stage: MACD line crossing above its signal line recently.

use super::{
    below_min_price, latest_close, Decision, Diagnostics, FilterError, FilterStage,
    CROSSOVER_WINDOW, MIN_PRICE,
};
use crate::domain::OhlcvSeries;
use crate::indicators::{cross_above_within, latest_defined, Cross, Macd};

#[derive(Debug, Clone)]
pub struct MacdCrossoverStage {
    macd: Macd,
    pub min_price: f64,
}

impl Default for MacdCrossoverStage {
    fn default() -> Self {
        Self {
            macd: Macd::default(),
            min_price: MIN_PRICE,
        }
    }
}

impl FilterStage for MacdCrossoverStage {
    fn name(&self) -> &str {
        "macd_crossover"
    }

    fn min_bars(&self) -> usize {
        30
    }

    fn evaluate_series(&self, series: &OhlcvSeries) -> Result<Decision, FilterError> {
        let close = latest_close(series)?;
        let macd = self.macd.compute_all(&series.closes());

        let line = latest_defined(&macd.line)
            .ok_or_else(|| FilterError::IndicatorUndefined("macd".into()))?;
        let signal = latest_defined(&macd.signal)
            .ok_or_else(|| FilterError::IndicatorUndefined("macd_signal".into()))?;

        let mut diagnostics = Diagnostics::from([
            ("close".to_string(), close),
            ("macd".to_string(), line),
            ("macd_signal".to_string(), signal),
        ]);

        let cross = cross_above_within(&macd.line, &macd.signal, CROSSOVER_WINDOW);
        if cross == Cross::Undefined {
            return Err(FilterError::IndicatorUndefined("macd crossover window".into()));
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
                format!("no MACD/signal cross in last {CROSSOVER_WINDOW} bars"),
                diagnostics,
            ))
        }
    }
}
