//! Series cache: serves one daily series per symbol, fetching when stale.
//!
//! An entry is fresh when its latest bar is no older than yesterday (UTC), or
//! when it was already refreshed today. The second rule keeps weekends and
//! holidays from refetching on every call: the provider has nothing newer.

use super::clock::Clock;
use super::normalize::normalize;
use super::provider::{DataError, DataProvider};
use super::store::{CacheEntry, SeriesStore};
use crate::domain::{OhlcvSeries, Symbol};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Calendar days of history requested on a refresh.
    pub lookback_days: u32,
    /// Never call the provider; serve whatever is stored, stale or not.
    pub offline: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            offline: false,
        }
    }
}

pub struct SeriesCache {
    store: Arc<dyn SeriesStore>,
    provider: Arc<dyn DataProvider>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl SeriesCache {
    pub fn new(
        store: Arc<dyn SeriesStore>,
        provider: Arc<dyn DataProvider>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn DataProvider {
        self.provider.as_ref()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today_utc()
    }

    /// Fresh series for `symbol`, from the store when possible.
    pub fn get_series(&self, symbol: &Symbol) -> Result<OhlcvSeries, DataError> {
        let cached = match self.store.get(symbol) {
            Ok(entry) => entry,
            Err(e) => {
                // An unreadable entry is treated as missing; the refresh overwrites it.
                tracing::warn!("{symbol}: cache read failed, refetching: {e}");
                None
            }
        };
        let today = self.today();

        match cached {
            Some(entry) if is_fresh(&entry, today) => {
                tracing::debug!("{symbol}: cache hit ({} bars)", entry.series.len());
                Ok(entry.series)
            }
            Some(entry) if self.config.offline => {
                tracing::debug!("{symbol}: serving stale entry in offline mode");
                Ok(entry.series)
            }
            None if self.config.offline => Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            }),
            stale => {
                tracing::debug!(
                    "{symbol}: cache {}, fetching from {}",
                    if stale.is_some() { "stale" } else { "miss" },
                    self.provider.name()
                );
                self.refresh(symbol)
            }
        }
    }

    /// Fetch from the provider and overwrite the stored entry.
    pub fn refresh(&self, symbol: &Symbol) -> Result<OhlcvSeries, DataError> {
        let fetched = self
            .provider
            .fetch_daily_bars(symbol, self.config.lookback_days)
            .map_err(|e| {
                tracing::warn!("{symbol}: fetch failed: {e}");
                e
            })?;
        let source = fetched.source;
        let series = normalize(fetched)?;

        let entry = CacheEntry {
            series,
            last_updated: self.today(),
            source,
        };
        if let Err(e) = self.store.put(symbol, &entry) {
            // The fetched data is still good for this run.
            tracing::warn!("{symbol}: cache write failed: {e}");
        }
        Ok(entry.series)
    }
}

fn is_fresh(entry: &CacheEntry, today: NaiveDate) -> bool {
    if entry.last_updated == today {
        return true;
    }
    entry
        .series
        .last_date()
        .is_some_and(|last| last >= today - Duration::days(1))
}
