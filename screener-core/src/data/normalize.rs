//! Normalization of provider rows into a canonical series.
//!
//! Rows whose close is missing or non-positive carry no information for the
//! indicators and are dropped; what remains is sorted ascending with duplicate
//! dates collapsed to the last revision.

use super::provider::{DataError, FetchResult};
use crate::domain::{Bar, OhlcvSeries};

/// Turn a raw fetch into an [`OhlcvSeries`], or `NoUsableData` if nothing survives.
pub fn normalize(fetch: FetchResult) -> Result<OhlcvSeries, DataError> {
    let raw = fetch.bars.len();
    let bars: Vec<Bar> = fetch.bars.into_iter().filter(usable).collect();

    if bars.is_empty() {
        return Err(DataError::NoUsableData {
            symbol: fetch.symbol.to_string(),
            reason: format!("none of {raw} rows had a usable close"),
        });
    }
    if bars.len() < raw {
        tracing::debug!("{}: dropped {} unusable rows", fetch.symbol, raw - bars.len());
    }

    Ok(OhlcvSeries::from_unsorted(fetch.symbol, bars))
}

fn usable(bar: &Bar) -> bool {
    bar.close.is_finite() && bar.close > 0.0
}
