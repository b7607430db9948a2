//! Cache warm-up: pulls a symbol list through the series cache ahead of a screen.

use super::cache::SeriesCache;
use super::provider::{DataError, DownloadProgress};
use crate::domain::Symbol;

/// Fetch every symbol through `cache`, one at a time.
///
/// Fresh entries are left alone unless `force` is set. Stops at the first sign
/// the provider is blocking us; the remaining symbols are reported as
/// `CircuitBreakerTripped`.
pub fn warm_cache(
    cache: &SeriesCache,
    symbols: &[Symbol],
    force: bool,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = symbols.len();
    let mut succeeded = 0;
    let mut failed = 0;
    let mut errors: Vec<(Symbol, DataError)> = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
        let result = if force {
            cache.refresh(symbol).map(|_| ())
        } else {
            cache.get_series(symbol).map(|_| ())
        };
        progress.on_complete(symbol, i, total, &result);

        match result {
            Ok(()) => succeeded += 1,
            Err(e) => {
                errors.push((symbol.clone(), e));
                failed += 1;
            }
        }

        if !cache.provider().is_available() {
            for sym in &symbols[(i + 1)..] {
                errors.push((sym.clone(), DataError::CircuitBreakerTripped));
                failed += 1;
            }
            break;
        }
    }

    progress.on_batch_complete(succeeded, failed, total);

    DownloadSummary {
        total,
        succeeded,
        failed,
        errors,
    }
}

/// Summary of a warm-up run.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(Symbol, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cache::CacheConfig;
    use crate::data::clock::FixedClock;
    use crate::data::provider::{DataProvider, FetchResult};
    use crate::data::static_provider::StaticProvider;
    use crate::data::store::MemoryStore;
    use crate::domain::Bar;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        done: AtomicUsize,
    }

    impl DownloadProgress for Counting {
        fn on_complete(&self, _: &Symbol, _: usize, _: usize, _: &Result<(), DataError>) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
        fn on_batch_complete(&self, _: usize, _: usize, _: usize) {}
    }

    /// Provider whose circuit breaker is already open.
    struct Blocked;

    impl DataProvider for Blocked {
        fn name(&self) -> &str {
            "blocked"
        }
        fn fetch_daily_bars(&self, _: &Symbol, _: u32) -> Result<FetchResult, DataError> {
            Err(DataError::CircuitBreakerTripped)
        }
        fn is_available(&self) -> bool {
            false
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    fn syms(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|n| Symbol::parse(n).unwrap()).collect()
    }

    #[test]
    fn counts_successes_and_failures() {
        let aapl = Symbol::parse("AAPL").unwrap();
        let bar = Bar {
            date: today(),
            open: 10.0,
            high: 10.0,
            low: 10.0,
            close: 10.0,
            volume: 1,
        };
        let provider = Arc::new(StaticProvider::new().with_bars(aapl, vec![bar]));
        let cache = SeriesCache::new(
            Arc::new(MemoryStore::new()),
            provider,
            Arc::new(FixedClock(today())),
            CacheConfig::default(),
        );
        let progress = Counting {
            done: AtomicUsize::new(0),
        };

        let summary = warm_cache(&cache, &syms(&["AAPL", "ZZZZ"]), false, &progress);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_succeeded());
        assert_eq!(progress.done.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stops_when_provider_blocks() {
        let cache = SeriesCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(Blocked),
            Arc::new(FixedClock(today())),
            CacheConfig::default(),
        );
        let progress = Counting {
            done: AtomicUsize::new(0),
        };

        let summary = warm_cache(&cache, &syms(&["A", "B", "C"]), true, &progress);
        assert_eq!(summary.failed, 3);
        assert_eq!(progress.done.load(Ordering::SeqCst), 1);
        assert!(summary
            .errors
            .iter()
            .all(|(_, e)| matches!(e, DataError::CircuitBreakerTripped)));
    }
}
