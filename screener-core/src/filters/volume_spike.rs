//! Volume-anomaly stage: latest volume well above its recent baseline.

use super::{below_min_price, latest_close, Decision, Diagnostics, FilterError, FilterStage, MIN_PRICE};
use crate::domain::OhlcvSeries;
use crate::indicators::volume_spike;

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSpikeStage {
    pub multiplier: f64,
    pub min_price: f64,
}

impl VolumeSpikeStage {
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier,
            min_price: MIN_PRICE,
        }
    }
}

impl Default for VolumeSpikeStage {
    fn default() -> Self {
        Self::new(1.5)
    }
}

impl FilterStage for VolumeSpikeStage {
    fn name(&self) -> &str {
        "volume_spike"
    }

    fn min_bars(&self) -> usize {
        21
    }

    fn evaluate_series(&self, series: &OhlcvSeries) -> Result<Decision, FilterError> {
        let close = latest_close(series)?;
        let spike = volume_spike(&series.volumes())
            .ok_or_else(|| FilterError::IndicatorUndefined("volume baseline".into()))?;

        let mut diagnostics = Diagnostics::from([
            ("close".to_string(), close),
            ("volume".to_string(), spike.latest),
            ("avg_volume".to_string(), spike.baseline),
        ]);
        // Silent baseline: the ratio has no finite value to report.
        if spike.ratio.is_finite() {
            diagnostics.insert("volume_ratio".to_string(), spike.ratio);
        }

        if let Some(reason) = below_min_price(close, self.min_price) {
            return Ok(Decision::Reject(reason, diagnostics));
        }
        if spike.latest > self.multiplier * spike.baseline {
            Ok(Decision::Pass(diagnostics))
        } else {
            Ok(Decision::Reject(
                format!("volume ratio {:.2} not above {:.2}", spike.ratio, self.multiplier),
                diagnostics,
            ))
        }
    }
}
