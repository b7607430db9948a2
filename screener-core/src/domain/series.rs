//! OHLCV series: the date-ordered bar history of one symbol.

use super::{Bar, Symbol};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("bar dates not strictly increasing at index {index}: {prev} then {next}")]
    Unordered {
        index: usize,
        prev: NaiveDate,
        next: NaiveDate,
    },
}

/// Daily bars for one symbol, strictly increasing by date.
///
/// The invariant is checked on construction and the bars are never exposed
/// mutably, so every `OhlcvSeries` in the system is ordered and duplicate-free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvSeries {
    symbol: Symbol,
    bars: Vec<Bar>,
}

impl OhlcvSeries {
    /// Build a series from bars that are already sorted ascending.
    pub fn new(symbol: Symbol, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[0].date >= pair[1].date {
                return Err(SeriesError::Unordered {
                    index: i + 1,
                    prev: pair[0].date,
                    next: pair[1].date,
                });
            }
        }
        Ok(Self { symbol, bars })
    }

    /// Build a series from bars in any order.
    ///
    /// Sorts ascending by date; when a date appears more than once the last
    /// occurrence in the input wins (providers append revisions).
    pub fn from_unsorted(symbol: Symbol, mut bars: Vec<Bar>) -> Self {
        // Stable sort keeps input order among equal dates, so the last duplicate
        // is the latest revision.
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self {
            symbol,
            bars: deduped,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Close column as a dense `f64` vector.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Volume column as `f64` for averaging.
    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume as f64).collect()
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}
