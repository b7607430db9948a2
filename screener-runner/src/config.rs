//! Serializable screen configuration.
//!
//! Everything a run needs (stage list, worker count, cache location, provider
//! credentials) lives here and is handed to constructors explicitly. Every
//! field has a default, so an empty TOML file is a valid config that runs the
//! four standard stages.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use screener_core::data::{CacheConfig, HttpOptions, DEFAULT_LOOKBACK_DAYS};
use screener_core::filters::{
    EmaCrossoverStage, FilterStage, MacdCrossoverStage, RsiStage, VolumeSpikeStage, MIN_PRICE,
};

use crate::aggregate::SortOrder;
use crate::pipeline::{DEFAULT_WORKERS, MAX_WORKERS};

/// Environment variable consulted when no Twelve Data key is configured.
pub const TWELVE_DATA_KEY_ENV: &str = "TWELVE_DATA_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("workers must be between 1 and {MAX_WORKERS}, got {0}")]
    WorkersOutOfRange(usize),

    #[error("filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("provider 'twelve_data' needs an API key (config or {TWELVE_DATA_KEY_ENV})")]
    MissingApiKey,
}

// ─── Top level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Size of the per-stage worker pool.
    pub workers: usize,
    /// Stages, run in this order. Disabled entries are skipped.
    pub filters: Vec<FilterConfig>,
    pub sort: SortOrder,
    pub cache: CacheSettings,
    pub provider: ProviderSettings,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            filters: FilterConfig::standard(),
            sort: SortOrder::default(),
            cache: CacheSettings::default(),
            provider: ProviderSettings::default(),
        }
    }
}

impl ScreenConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(ConfigError::WorkersOutOfRange(self.workers));
        }
        for filter in &self.filters {
            filter.kind.validate()?;
        }
        Ok(())
    }

    /// Keep only the named filters, in the given order. Names not present in
    /// the config are added with default parameters.
    pub fn select_filters(&mut self, names: &[String]) -> Result<(), ConfigError> {
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let existing = self
                .filters
                .iter()
                .find(|f| f.kind.name() == name.as_str())
                .map(|f| f.kind.clone());
            let kind = match existing {
                Some(kind) => kind,
                None => FilterKind::default_for(name).ok_or_else(|| ConfigError::InvalidFilter {
                    filter: name.clone(),
                    reason: "unknown filter".into(),
                })?,
            };
            selected.push(FilterConfig {
                enabled: true,
                kind,
            });
        }
        self.filters = selected;
        Ok(())
    }

    /// Instantiate the enabled stages, in config order.
    pub fn build_stages(&self) -> Vec<Arc<dyn FilterStage>> {
        self.filters
            .iter()
            .filter(|f| f.enabled)
            .map(|f| f.kind.build())
            .collect()
    }
}

// ─── Filters ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: FilterKind,
}

fn enabled_by_default() -> bool {
    true
}

impl FilterConfig {
    /// RSI, EMA crossover, MACD crossover, volume spike, all with defaults.
    pub fn standard() -> Vec<Self> {
        [
            FilterKind::Rsi(RsiParams::default()),
            FilterKind::EmaCrossover(PriceParams::default()),
            FilterKind::MacdCrossover(PriceParams::default()),
            FilterKind::VolumeSpike(VolumeParams::default()),
        ]
        .into_iter()
        .map(|kind| Self {
            enabled: true,
            kind,
        })
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterKind {
    Rsi(RsiParams),
    EmaCrossover(PriceParams),
    MacdCrossover(PriceParams),
    VolumeSpike(VolumeParams),
}

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rsi(_) => "rsi",
            Self::EmaCrossover(_) => "ema_crossover",
            Self::MacdCrossover(_) => "macd_crossover",
            Self::VolumeSpike(_) => "volume_spike",
        }
    }

    pub fn default_for(name: &str) -> Option<Self> {
        match name {
            "rsi" => Some(Self::Rsi(RsiParams::default())),
            "ema_crossover" | "ema" => Some(Self::EmaCrossover(PriceParams::default())),
            "macd_crossover" | "macd" => Some(Self::MacdCrossover(PriceParams::default())),
            "volume_spike" | "volume" => Some(Self::VolumeSpike(VolumeParams::default())),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidFilter {
            filter: self.name().to_string(),
            reason,
        };
        let min_price = match self {
            Self::Rsi(p) => {
                if !(p.threshold.is_finite() && p.buffer.is_finite()) {
                    return Err(invalid("threshold and buffer must be finite".into()));
                }
                p.min_price
            }
            Self::EmaCrossover(p) | Self::MacdCrossover(p) => p.min_price,
            Self::VolumeSpike(p) => {
                if !(p.multiplier.is_finite() && p.multiplier > 0.0) {
                    return Err(invalid(format!(
                        "multiplier must be positive, got {}",
                        p.multiplier
                    )));
                }
                p.min_price
            }
        };
        if !(min_price.is_finite() && min_price >= 0.0) {
            return Err(invalid(format!("min_price must be >= 0, got {min_price}")));
        }
        Ok(())
    }

    fn build(&self) -> Arc<dyn FilterStage> {
        match self {
            Self::Rsi(p) => Arc::new(RsiStage::new(p.threshold, p.buffer, p.min_price)),
            Self::EmaCrossover(p) => Arc::new(EmaCrossoverStage {
                min_price: p.min_price,
                ..EmaCrossoverStage::default()
            }),
            Self::MacdCrossover(p) => {
                let mut stage = MacdCrossoverStage::default();
                stage.min_price = p.min_price;
                Arc::new(stage)
            }
            Self::VolumeSpike(p) => Arc::new(VolumeSpikeStage {
                multiplier: p.multiplier,
                min_price: p.min_price,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiParams {
    pub threshold: f64,
    pub buffer: f64,
    pub min_price: f64,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self {
            threshold: 50.0,
            buffer: 0.0,
            min_price: MIN_PRICE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceParams {
    pub min_price: f64,
}

impl Default for PriceParams {
    fn default() -> Self {
        Self {
            min_price: MIN_PRICE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeParams {
    pub multiplier: f64,
    pub min_price: f64,
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            multiplier: 1.5,
            min_price: MIN_PRICE,
        }
    }
}

// ─── Cache and provider ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir: PathBuf,
    pub lookback_days: u32,
    pub offline: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/cache"),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            offline: false,
        }
    }
}

impl CacheSettings {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            lookback_days: self.lookback_days,
            offline: self.offline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    TwelveData,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub breaker_cooldown_secs: u64,
    pub breaker_threshold: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            api_key: None,
            timeout_secs: 30,
            max_retries: 3,
            breaker_cooldown_secs: 30 * 60,
            breaker_threshold: 3,
        }
    }
}

impl ProviderSettings {
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            ..HttpOptions::default()
        }
    }

    /// Configured key, else the environment.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(TWELVE_DATA_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}
