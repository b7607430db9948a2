//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over market-data sources (Yahoo Finance,
//! Twelve Data, synthetic, in-memory) so the series cache is provider-agnostic
//! and tests can substitute a fake.

use crate::domain::{Bar, Symbol};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error types for data operations.
///
/// Displayable in CLI output and carried inside filter results.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no usable data for {symbol}: {reason}")]
    NoUsableData { symbol: String, reason: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached data for symbol '{symbol}' and offline mode is on")]
    NoCachedData { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// True when the provider answered but had nothing usable for the symbol,
    /// as opposed to a transport or storage failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::SymbolNotFound { .. } | Self::NoUsableData { .. } | Self::NoCachedData { .. }
        )
    }
}

/// Result of a successful fetch for a single symbol.
///
/// Bars are in the canonical schema but may be unsorted or contain
/// duplicate dates; the series cache normalizes them.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: Symbol,
    pub bars: Vec<Bar>,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    TwelveData,
    Synthetic,
    Static,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YahooFinance => "yahoo_finance",
            Self::TwelveData => "twelve_data",
            Self::Synthetic => "synthetic",
            Self::Static => "static",
        }
    }
}

/// Trait for daily-bar data providers.
///
/// Implementations own their transport, authentication and latency bounds.
/// The cache layer sits above this trait; providers don't know about the cache.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch roughly the last `lookback_days` calendar days of daily bars.
    fn fetch_daily_bars(&self, symbol: &Symbol, lookback_days: u32)
        -> Result<FetchResult, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}

/// Progress callback for multi-symbol cache warm-up.
pub trait DownloadProgress: Send + Sync {
    /// Called when a symbol fetch completes.
    fn on_complete(&self, symbol: &Symbol, index: usize, total: usize, result: &Result<(), DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that writes through `tracing`.
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn on_complete(
        &self,
        symbol: &Symbol,
        index: usize,
        total: usize,
        result: &Result<(), DataError>,
    ) {
        match result {
            Ok(()) => tracing::info!("[{}/{}] {symbol}: ok", index + 1, total),
            Err(e) => tracing::warn!("[{}/{}] {symbol}: {e}", index + 1, total),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!("download complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}
