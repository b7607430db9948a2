//! Filter stages: one indicator computation plus a pass/fail predicate.
//!
//! Every stage produces a [`FilterResult`] per symbol. Stages fail closed:
//! missing data, short history, undefined indicators and panics all become
//! `Verdict::Failed`, which never counts as a pass.

pub mod ema_crossover;
pub mod macd_crossover;
pub mod rsi;
pub mod volume_spike;

pub use ema_crossover::EmaCrossoverStage;
pub use macd_crossover::MacdCrossoverStage;
pub use rsi::RsiStage;
pub use volume_spike::VolumeSpikeStage;

use crate::data::DataError;
use crate::domain::{OhlcvSeries, Symbol};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Latest close below this is rejected by every stage.
pub const MIN_PRICE: f64 = 5.0;

/// Crossover stages look for a cross on any of this many most recent bars.
pub const CROSSOVER_WINDOW: usize = 5;

/// Indicator name → value, ordered by name for stable output.
pub type Diagnostics = BTreeMap<String, f64>;

/// Why a symbol could not be judged. Always a non-pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("insufficient history: need {required} bars, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("indicator undefined: {0}")]
    IndicatorUndefined(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("evaluation panicked: {0}")]
    EvaluationPanicked(String),
}

impl From<&DataError> for FilterError {
    fn from(e: &DataError) -> Self {
        if e.is_unavailable() {
            Self::DataUnavailable(e.to_string())
        } else {
            Self::ProviderError(e.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Passed,
    /// The predicate evaluated to false.
    Rejected(String),
    Failed(FilterError),
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcome of one stage for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub symbol: Symbol,
    pub verdict: Verdict,
    pub diagnostics: Diagnostics,
}

impl FilterResult {
    pub fn failed(symbol: Symbol, error: FilterError) -> Self {
        Self {
            symbol,
            verdict: Verdict::Failed(error),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.verdict.is_passed()
    }
}

/// What a stage concluded about a series it could evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Pass(Diagnostics),
    Reject(String, Diagnostics),
}

/// A standardized screening stage.
///
/// Implementations only write [`evaluate_series`](Self::evaluate_series); the
/// provided [`evaluate`](Self::evaluate) handles missing data, short history
/// and panics uniformly.
pub trait FilterStage: Send + Sync {
    /// Stage name, e.g. `"rsi"`.
    fn name(&self) -> &str;

    /// Bars required before the stage will evaluate.
    fn min_bars(&self) -> usize;

    /// Decide on a series of at least `min_bars()` bars.
    fn evaluate_series(&self, series: &OhlcvSeries) -> Result<Decision, FilterError>;

    fn evaluate(&self, symbol: &Symbol, data: Result<&OhlcvSeries, &DataError>) -> FilterResult {
        let series = match data {
            Ok(series) => series,
            Err(e) => return FilterResult::failed(symbol.clone(), e.into()),
        };

        if series.len() < self.min_bars() {
            return FilterResult::failed(
                symbol.clone(),
                FilterError::InsufficientHistory {
                    required: self.min_bars(),
                    available: series.len(),
                },
            );
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.evaluate_series(series)));
        let (verdict, diagnostics) = match outcome {
            Ok(Ok(Decision::Pass(d))) => (Verdict::Passed, d),
            Ok(Ok(Decision::Reject(reason, d))) => (Verdict::Rejected(reason), d),
            Ok(Err(e)) => (Verdict::Failed(e), Diagnostics::new()),
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                tracing::warn!("{symbol}: stage '{}' panicked: {msg}", self.name());
                (
                    Verdict::Failed(FilterError::EvaluationPanicked(msg)),
                    Diagnostics::new(),
                )
            }
        };

        FilterResult {
            symbol: symbol.clone(),
            verdict,
            diagnostics,
        }
    }
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Latest close, failing if it is undefined.
pub(crate) fn latest_close(series: &OhlcvSeries) -> Result<f64, FilterError> {
    series
        .latest()
        .map(|b| b.close)
        .filter(|c| c.is_finite())
        .ok_or_else(|| FilterError::IndicatorUndefined("latest close".into()))
}

/// Rejection reason when the close is under the price floor.
pub(crate) fn below_min_price(close: f64, min_price: f64) -> Option<String> {
    (close < min_price).then(|| format!("close {close:.2} below minimum price {min_price:.2}"))
}

#[cfg(test)]
pub(crate) fn series_from_closes(closes: &[f64]) -> OhlcvSeries {
    let bars = crate::indicators::make_bars(closes);
    OhlcvSeries::new(Symbol::parse("TEST").unwrap(), bars).unwrap()
}
