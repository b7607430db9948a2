//! In-memory provider serving pre-built bars, with a fetch counter.
//!
//! Used wherever a network provider must be replaced by known data: unit and
//! integration tests, and embedding the pipeline over bars loaded elsewhere.

use super::provider::{DataError, DataProvider, DataSource, FetchResult};
use crate::domain::{Bar, Symbol};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct StaticProvider {
    responses: HashMap<Symbol, Result<Vec<Bar>, DataError>>,
    fetches: AtomicUsize,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bars` for `symbol`.
    pub fn with_bars(mut self, symbol: Symbol, bars: Vec<Bar>) -> Self {
        self.responses.insert(symbol, Ok(bars));
        self
    }

    /// Fail every fetch of `symbol` with `error`.
    pub fn with_error(mut self, symbol: Symbol, error: DataError) -> Self {
        self.responses.insert(symbol, Err(error));
        self
    }

    /// Number of `fetch_daily_bars` calls made so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl DataProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_daily_bars(
        &self,
        symbol: &Symbol,
        _lookback_days: u32,
    ) -> Result<FetchResult, DataError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(symbol) {
            Some(Ok(bars)) => Ok(FetchResult {
                symbol: symbol.clone(),
                bars: bars.clone(),
                source: DataSource::Static,
            }),
            Some(Err(e)) => Err(e.clone()),
            None => Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }),
        }
    }
}
