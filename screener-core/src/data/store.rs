//! Key-value storage for cached series, keyed by symbol.

use super::provider::{DataError, DataSource};
use crate::domain::{OhlcvSeries, Symbol};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::RwLock;

/// One cached series and the UTC date it was last fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub series: OhlcvSeries,
    pub last_updated: NaiveDate,
    pub source: DataSource,
}

/// Persistence behind the series cache.
///
/// Implementations must round-trip the series losslessly, including dates.
/// Entries for different symbols are independent; `put` overwrites.
pub trait SeriesStore: Send + Sync {
    fn get(&self, symbol: &Symbol) -> Result<Option<CacheEntry>, DataError>;

    fn put(&self, symbol: &Symbol, entry: &CacheEntry) -> Result<(), DataError>;
}

/// Process-local store. Nothing touches the filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Symbol, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SeriesStore for MemoryStore {
    fn get(&self, symbol: &Symbol) -> Result<Option<CacheEntry>, DataError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| DataError::CacheError("memory store lock poisoned".into()))?;
        Ok(entries.get(symbol).cloned())
    }

    fn put(&self, symbol: &Symbol, entry: &CacheEntry) -> Result<(), DataError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DataError::CacheError("memory store lock poisoned".into()))?;
        entries.insert(symbol.clone(), entry.clone());
        Ok(())
    }
}
