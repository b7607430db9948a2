//! Ticker universe: the ordered, deduplicated list of symbols to screen.
//!
//! Universes are usually read from a CSV with a `symbol` column (an index
//! constituents export); other columns are ignored.

use super::provider::DataError;
use crate::domain::Symbol;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Universe {
    symbols: Vec<Symbol>,
}

impl Universe {
    /// Keep the first occurrence of each symbol, in input order.
    pub fn from_symbols(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        let mut seen = HashSet::new();
        let symbols = symbols
            .into_iter()
            .filter(|s| seen.insert(s.clone()))
            .collect();
        Self { symbols }
    }

    /// Parse raw tickers, rejecting the whole list on the first malformed one.
    pub fn parse<S: AsRef<str>>(tickers: &[S]) -> Result<Self, DataError> {
        let symbols = tickers
            .iter()
            .map(|t| Symbol::parse(t.as_ref()).map_err(|e| DataError::Other(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_symbols(symbols))
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        #[derive(Deserialize)]
        struct Row {
            symbol: String,
        }

        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut symbols = Vec::new();
        for (line, row) in rdr.deserialize::<Row>().enumerate() {
            let row = row.map_err(|e| DataError::Other(format!("universe row {}: {e}", line + 2)))?;
            if row.symbol.trim().is_empty() {
                continue;
            }
            match Symbol::parse(&row.symbol) {
                Ok(sym) => symbols.push(sym),
                Err(e) => tracing::warn!("skipping universe row {}: {e}", line + 2),
            }
        }
        Ok(Self::from_symbols(symbols))
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.contains(symbol)
    }
}

/// Where a universe comes from.
pub trait UniverseSource {
    fn load_universe(&self) -> Result<Universe, DataError>;
}

/// CSV file with a `symbol` column.
#[derive(Debug, Clone)]
pub struct CsvUniverse {
    path: PathBuf,
}

impl CsvUniverse {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UniverseSource for CsvUniverse {
    fn load_universe(&self) -> Result<Universe, DataError> {
        let file = std::fs::File::open(&self.path).map_err(|e| {
            DataError::Other(format!("open universe {}: {e}", self.path.display()))
        })?;
        Universe::from_csv_reader(file)
    }
}

impl UniverseSource for Universe {
    fn load_universe(&self) -> Result<Universe, DataError> {
        Ok(self.clone())
    }
}
