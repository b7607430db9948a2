//! Wiring the data layer from a [`ScreenConfig`].
//!
//! Resolves the provider, opens the Parquet store under the configured cache
//! directory and assembles the [`SeriesCache`] the pipeline reads through.
//! The synthetic provider stands in for the network when requested; its bars
//! are tagged `Synthetic` in the store metadata.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use screener_core::data::{
    CircuitBreaker, Clock, DataError, DataProvider, ParquetStore, SeriesCache, SeriesStore,
    SyntheticProvider, SystemClock, TwelveDataProvider, YahooProvider,
};

use crate::config::{ConfigError, ProviderKind, ScreenConfig};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to initialise provider: {0}")]
    Provider(#[from] DataError),
}

/// Options that override the config at load time (CLI flags).
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Use the synthetic provider regardless of config.
    pub synthetic: bool,
    /// Never touch the provider.
    pub offline: bool,
}

/// Provider selected by `config`, or the synthetic one when forced.
pub fn build_provider(
    config: &ScreenConfig,
    clock: Arc<dyn Clock>,
    opts: LoadOptions,
) -> Result<Arc<dyn DataProvider>, LoadError> {
    let settings = &config.provider;
    let kind = if opts.synthetic {
        ProviderKind::Synthetic
    } else {
        settings.kind
    };

    let breaker = Arc::new(CircuitBreaker::new(
        Duration::from_secs(settings.breaker_cooldown_secs),
        settings.breaker_threshold,
    ));

    let provider: Arc<dyn DataProvider> = match kind {
        ProviderKind::Yahoo => {
            Arc::new(YahooProvider::new(breaker, settings.http_options())?.with_clock(clock))
        }
        ProviderKind::TwelveData => {
            // Offline runs never call the provider, so a missing key only matters online.
            let key = if opts.offline || config.cache.offline {
                settings.resolve_api_key().unwrap_or_else(|_| "offline".into())
            } else {
                settings.resolve_api_key()?
            };
            Arc::new(TwelveDataProvider::new(key, breaker, settings.http_options())?.with_clock(clock))
        }
        ProviderKind::Synthetic => {
            tracing::warn!("using synthetic data; results do not reflect real markets");
            Arc::new(SyntheticProvider::new(clock))
        }
    };
    Ok(provider)
}

/// Series cache over the configured Parquet store and provider.
pub fn build_cache(config: &ScreenConfig, opts: LoadOptions) -> Result<SeriesCache, LoadError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn SeriesStore> = Arc::new(ParquetStore::new(&config.cache.dir));
    build_cache_with(config, store, clock, opts)
}

/// As [`build_cache`], with the store and clock supplied by the caller.
pub fn build_cache_with(
    config: &ScreenConfig,
    store: Arc<dyn SeriesStore>,
    clock: Arc<dyn Clock>,
    opts: LoadOptions,
) -> Result<SeriesCache, LoadError> {
    let provider = build_provider(config, Arc::clone(&clock), opts)?;
    let mut cache_config = config.cache.cache_config();
    cache_config.offline |= opts.offline;

    tracing::debug!(
        "series cache: provider={}, dir={}, lookback={}d, offline={}",
        provider.name(),
        config.cache.dir.display(),
        cache_config.lookback_days,
        cache_config.offline
    );
    Ok(SeriesCache::new(store, provider, clock, cache_config))
}
