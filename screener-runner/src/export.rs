//! Result export: JSON and CSV.
//!
//! JSON is a list of `{symbol, diagnostics}` records. CSV has a `symbol`
//! column followed by the union of all diagnostic names, sorted; a record
//! without a given diagnostic leaves the cell empty. RSI is rounded to two
//! decimals in both formats; other values are written as computed.

use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;

use screener_core::filters::Diagnostics;

use crate::aggregate::ScreenRecord;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to serialize results: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported output format '{0}' (expected .json or .csv)")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(ExportError::UnsupportedFormat(ext)),
        }
    }
}

/// Round values that are shown to two decimals.
fn display_value(key: &str, value: f64) -> f64 {
    if key == "rsi" && value.is_finite() {
        (value * 100.0).round() / 100.0
    } else {
        value
    }
}

fn display_diagnostics(d: &Diagnostics) -> Diagnostics {
    d.iter().map(|(k, v)| (k.clone(), display_value(k, *v))).collect()
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(records: &[ScreenRecord]) -> Result<String, ExportError> {
    let display: Vec<ScreenRecord> = records
        .iter()
        .map(|r| ScreenRecord {
            symbol: r.symbol.clone(),
            diagnostics: display_diagnostics(&r.diagnostics),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&display)?)
}

// ─── CSV ────────────────────────────────────────────────────────────

pub fn export_csv(records: &[ScreenRecord]) -> Result<String, ExportError> {
    let columns: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.diagnostics.keys().map(String::as_str))
        .collect();

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(std::iter::once("symbol").chain(columns.iter().copied()))?;

    for r in records {
        let mut row = Vec::with_capacity(columns.len() + 1);
        row.push(r.symbol.as_str().to_string());
        for col in &columns {
            row.push(
                r.diagnostics
                    .get(*col)
                    .filter(|v| v.is_finite())
                    .map(|v| display_value(col, *v).to_string())
                    .unwrap_or_default(),
            );
        }
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(data)
        .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Write `records` to `path`, choosing the format from its extension.
pub fn write_results(records: &[ScreenRecord], path: &Path) -> Result<(), ExportError> {
    let content = match ExportFormat::from_path(path)? {
        ExportFormat::Json => export_json(records)?,
        ExportFormat::Csv => export_csv(records)?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    tracing::info!("wrote {} result(s) to {}", records.len(), path.display());
    Ok(())
}
