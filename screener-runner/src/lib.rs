//! Screener Runner: configuration, staged pipeline, aggregation, export.
//!
//! This crate builds on `screener-core` to provide:
//! - `ScreenConfig` loaded from TOML, with validation
//! - Data-layer wiring (provider, Parquet store, series cache)
//! - The staged pipeline: sequential AND across stages, parallel per symbol
//! - Result aggregation and JSON/CSV export

pub mod aggregate;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod pipeline;
pub mod progress;

pub use aggregate::{aggregate, sort_records, ScreenRecord, SortOrder};
pub use config::{
    CacheSettings, ConfigError, FilterConfig, FilterKind, ProviderKind, ProviderSettings,
    ScreenConfig,
};
pub use data_loader::{build_cache, build_cache_with, build_provider, LoadError, LoadOptions};
pub use export::{export_csv, export_json, write_results, ExportError, ExportFormat};
pub use pipeline::{Pipeline, PipelineError, ScreenOutcome, StageReport, DEFAULT_WORKERS};
pub use progress::{LogProgress, NoProgress, ScreenProgress};
