//! Twelve Data provider (`/time_series` endpoint).
//!
//! Rows arrive newest-first with every number encoded as a string; this module
//! maps them onto the canonical bar schema and leaves ordering to the cache.

use super::circuit_breaker::CircuitBreaker;
use super::clock::{Clock, SystemClock};
use super::http::{build_client, fetch_window, get_with_retry, redacted, HttpOptions};
use super::provider::{DataError, DataProvider, DataSource, FetchResult};
use crate::domain::{Bar, Symbol};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

const BASE_URL: &str = "https://api.twelvedata.com";

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    values: Option<Vec<TimeSeriesRow>>,
    status: Option<String>,
    code: Option<u16>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesRow {
    datetime: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: Option<String>,
}

pub struct TwelveDataProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    circuit_breaker: Arc<CircuitBreaker>,
    options: HttpOptions,
    clock: Arc<dyn Clock>,
}

impl TwelveDataProvider {
    pub fn new(
        api_key: impl Into<String>,
        circuit_breaker: Arc<CircuitBreaker>,
        options: HttpOptions,
    ) -> Result<Self, DataError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DataError::AuthenticationRequired(
                "Twelve Data requires an API key".into(),
            ));
        }
        Ok(Self {
            client: build_client(&options)?,
            api_key,
            circuit_breaker,
            options,
            clock: Arc::new(SystemClock),
        })
    }

    /// Date source for the fetch window. Defaults to the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn series_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{BASE_URL}/time_series?symbol={symbol}&interval=1day&outputsize=500\
             &start_date={start}&end_date={end}&apikey={}",
            self.api_key
        )
    }

    fn parse_response(symbol: &Symbol, resp: TimeSeriesResponse) -> Result<Vec<Bar>, DataError> {
        let Some(values) = resp.values else {
            let message = resp.message.unwrap_or_else(|| "unknown error".into());
            return Err(match resp.code {
                Some(401) | Some(403) => DataError::AuthenticationRequired(message),
                Some(429) => DataError::RateLimited {
                    retry_after_secs: 60,
                },
                Some(404) => DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                },
                _ if resp.status.as_deref() == Some("error") => DataError::NoUsableData {
                    symbol: symbol.to_string(),
                    reason: message,
                },
                _ => DataError::ResponseFormatChanged(format!("no 'values' field: {message}")),
            });
        };

        let mut bars = Vec::with_capacity(values.len());
        for row in values {
            bars.push(parse_row(&row)?);
        }

        if bars.is_empty() {
            return Err(DataError::NoUsableData {
                symbol: symbol.to_string(),
                reason: "empty time series".into(),
            });
        }
        Ok(bars)
    }
}

fn parse_row(row: &TimeSeriesRow) -> Result<Bar, DataError> {
    let num = |field: &str, raw: &str| -> Result<f64, DataError> {
        raw.parse::<f64>().map_err(|e| {
            DataError::ResponseFormatChanged(format!("bad {field} '{raw}' on {}: {e}", row.datetime))
        })
    };

    // Daily rows carry a bare date; intraday-style timestamps keep the date part.
    let date_part = row.datetime.split_whitespace().next().unwrap_or_default();
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
        DataError::ResponseFormatChanged(format!("bad datetime '{}': {e}", row.datetime))
    })?;

    let volume = match row.volume.as_deref() {
        Some(v) => num("volume", v)?.max(0.0) as u64,
        None => 0,
    };

    Ok(Bar {
        date,
        open: num("open", &row.open)?,
        high: num("high", &row.high)?,
        low: num("low", &row.low)?,
        close: num("close", &row.close)?,
        volume,
    })
}

impl DataProvider for TwelveDataProvider {
    fn name(&self) -> &str {
        "twelve_data"
    }

    fn fetch_daily_bars(
        &self,
        symbol: &Symbol,
        lookback_days: u32,
    ) -> Result<FetchResult, DataError> {
        let (start, end) = fetch_window(self.clock.as_ref(), lookback_days);
        let url = self.series_url(symbol.as_str(), start, end);

        let resp = get_with_retry(
            &self.client,
            &url,
            &self.circuit_breaker,
            &self.options,
            symbol.as_str(),
        )?;
        let body: TimeSeriesResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!(
                "failed to parse response for {symbol}: {}",
                redacted(e)
            ))
        })?;

        let bars = Self::parse_response(symbol, body)?;
        self.circuit_breaker.record_success();

        Ok(FetchResult {
            symbol: symbol.clone(),
            bars,
            source: DataSource::TwelveData,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
