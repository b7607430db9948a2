//! Data layer: providers, storage, and the series cache.

pub mod cache;
pub mod circuit_breaker;
pub mod clock;
pub mod download;
mod http;
pub mod normalize;
pub mod parquet_store;
pub mod provider;
pub mod static_provider;
pub mod store;
pub mod synthetic;
pub mod twelve_data;
pub mod universe;
pub mod yahoo;

pub use cache::{CacheConfig, SeriesCache, DEFAULT_LOOKBACK_DAYS};
pub use circuit_breaker::CircuitBreaker;
pub use clock::{Clock, FixedClock, SystemClock};
pub use download::{warm_cache, DownloadSummary};
pub use http::HttpOptions;
pub use parquet_store::{CacheMeta, ParquetStore};
pub use provider::{
    DataError, DataProvider, DataSource, DownloadProgress, FetchResult, LogProgress,
};
pub use static_provider::StaticProvider;
pub use store::{CacheEntry, MemoryStore, SeriesStore};
pub use synthetic::SyntheticProvider;
pub use twelve_data::TwelveDataProvider;
pub use universe::{CsvUniverse, Universe, UniverseSource};
pub use yahoo::YahooProvider;
