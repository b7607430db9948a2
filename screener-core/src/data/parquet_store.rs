//! Parquet-backed series store with Hive-style symbol directories.
//!
//! Layout: `{cache_dir}/symbol={SYMBOL}/bars.parquet` plus `meta.json`.
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (schema, row count, BLAKE3 hash vs sidecar)
//! - Quarantine for corrupt files (`bars.parquet.quarantined`), which then
//!   read as a cache miss so the series is fetched again

use super::provider::{DataError, DataSource};
use super::store::{CacheEntry, SeriesStore};
use crate::domain::{Bar, OhlcvSeries, Symbol};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const BARS_FILE: &str = "bars.parquet";
const META_FILE: &str = "meta.json";
const COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Metadata sidecar for a cached symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: DataSource,
    pub last_updated: NaiveDate,
}

pub struct ParquetStore {
    cache_dir: PathBuf,
}

impl ParquetStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `{cache_dir}/symbol={SYMBOL}/`; `/` in share-class tickers becomes `_`.
    fn symbol_dir(&self, symbol: &Symbol) -> PathBuf {
        let safe = symbol.as_str().replace('/', "_");
        self.cache_dir.join(format!("symbol={safe}"))
    }

    pub fn get_meta(&self, symbol: &Symbol) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.symbol_dir(symbol).join(META_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Metadata of every cached symbol, sorted by symbol.
    pub fn list(&self) -> Result<Vec<CacheMeta>, DataError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut metas = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let meta_path = entry.path().join(META_FILE);
            let Ok(content) = fs::read_to_string(&meta_path) else {
                continue;
            };
            match serde_json::from_str::<CacheMeta>(&content) {
                Ok(meta) => metas.push(meta),
                Err(e) => tracing::warn!("unreadable cache metadata {}: {e}", meta_path.display()),
            }
        }
        metas.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(metas)
    }

    fn quarantine(&self, path: &Path, reason: &DataError) {
        let target = path.with_extension("parquet.quarantined");
        tracing::warn!("quarantining corrupt cache file {}: {reason}", path.display());
        if let Err(e) = fs::rename(path, &target) {
            tracing::warn!("quarantine rename failed for {}: {e}", path.display());
        }
    }
}

impl SeriesStore for ParquetStore {
    fn get(&self, symbol: &Symbol) -> Result<Option<CacheEntry>, DataError> {
        let dir = self.symbol_dir(symbol);
        let path = dir.join(BARS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let Some(meta) = self.get_meta(symbol) else {
            tracing::warn!("{symbol}: cached bars without metadata, ignoring");
            return Ok(None);
        };

        let bars = match load_and_validate(&path, &meta) {
            Ok(bars) => bars,
            Err(e) => {
                self.quarantine(&path, &e);
                return Ok(None);
            }
        };

        let series = match OhlcvSeries::new(symbol.clone(), bars) {
            Ok(series) => series,
            Err(e) => {
                self.quarantine(&path, &DataError::CacheError(e.to_string()));
                return Ok(None);
            }
        };

        Ok(Some(CacheEntry {
            series,
            last_updated: meta.last_updated,
            source: meta.source,
        }))
    }

    fn put(&self, symbol: &Symbol, entry: &CacheEntry) -> Result<(), DataError> {
        let bars = entry.series.bars();
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Err(DataError::CacheError("no bars to cache".into()));
        };

        let dir = self.symbol_dir(symbol);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let path = dir.join(BARS_FILE);
        let tmp_path = path.with_extension("parquet.tmp");
        let mut df = bars_to_dataframe(bars)?;
        write_parquet(&mut df, &tmp_path)?;
        rename_into_place(&tmp_path, &path)?;

        let meta = CacheMeta {
            symbol: symbol.to_string(),
            start_date: first.date,
            end_date: last.date,
            bar_count: bars.len(),
            data_hash: hash_bars(bars)?,
            source: entry.source,
            last_updated: entry.last_updated,
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        let meta_path = dir.join(META_FILE);
        let meta_tmp = meta_path.with_extension("json.tmp");
        fs::write(&meta_tmp, meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;
        rename_into_place(&meta_tmp, &meta_path)
    }
}

fn rename_into_place(tmp: &Path, dest: &Path) -> Result<(), DataError> {
    fs::rename(tmp, dest).map_err(|e| {
        let _ = fs::remove_file(tmp);
        DataError::CacheError(format!("atomic rename failed: {e}"))
    })
}

fn hash_bars(bars: &[Bar]) -> Result<String, DataError> {
    let bytes = serde_json::to_vec(bars)
        .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, DataError> {
    let epoch = epoch();
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate(path: &Path, meta: &CacheMeta) -> Result<Vec<Bar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::CacheError("empty parquet file".into()));
    }
    for col_name in COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::CacheError(format!("missing column '{col_name}'")));
        }
    }

    let bars = dataframe_to_bars(&df)?;
    if bars.len() != meta.bar_count {
        return Err(DataError::CacheError(format!(
            "row count {} does not match metadata {}",
            bars.len(),
            meta.bar_count
        )));
    }
    if hash_bars(&bars)? != meta.data_hash {
        return Err(DataError::CacheError("data hash mismatch".into()));
    }
    Ok(bars)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, DataError> {
    let map_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));

    let date_ca = df
        .column("date")
        .map_err(map_err)?
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let open_ca = df
        .column("open")
        .map_err(map_err)?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("open column type: {e}")))?;
    let high_ca = df
        .column("high")
        .map_err(map_err)?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("high column type: {e}")))?;
    let low_ca = df
        .column("low")
        .map_err(map_err)?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("low column type: {e}")))?;
    let close_ca = df
        .column("close")
        .map_err(map_err)?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("close column type: {e}")))?;
    let vol_ca = df
        .column("volume")
        .map_err(map_err)?
        .u64()
        .map_err(|e| DataError::ParquetError(format!("volume column type: {e}")))?;

    let epoch = epoch();
    let n = df.height();
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;

        bars.push(Bar {
            date: epoch + chrono::Duration::days(i64::from(date_days)),
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
        });
    }

    Ok(bars)
}
