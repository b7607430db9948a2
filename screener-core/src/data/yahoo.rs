//! Yahoo Finance data provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API. Yahoo has no official
//! API and is subject to unannounced format changes; anything that does not
//! parse into the shape below surfaces as `ResponseFormatChanged`.

use super::circuit_breaker::CircuitBreaker;
use super::clock::{Clock, SystemClock};
use super::http::{build_client, fetch_window, get_with_retry, redacted, HttpOptions};
use super::provider::{DataError, DataProvider, DataSource, FetchResult};
use crate::domain::{Bar, Symbol};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    options: HttpOptions,
    clock: Arc<dyn Clock>,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, options: HttpOptions) -> Result<Self, DataError> {
        Ok(Self {
            client: build_client(&options)?,
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

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = (end + Duration::days(1))
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d"
        )
    }

    fn parse_response(symbol: &Symbol, resp: ChartResponse) -> Result<Vec<Bar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => DataError::NoUsableData {
                symbol: symbol.to_string(),
                reason: format!("{}: {}", err.code, err.description),
            },
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // Yahoo omits `timestamp` entirely for symbols with no trading history.
        let timestamps = data.timestamp.ok_or_else(|| DataError::NoUsableData {
            symbol: symbol.to_string(),
            reason: "no timestamps in response".into(),
        })?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            // Holidays and halted sessions come back as null rows.
            let Some(close) = quote.close.get(i).copied().flatten() else {
                continue;
            };

            bars.push(Bar {
                date,
                open: quote.open.get(i).copied().flatten().unwrap_or(f64::NAN),
                high: quote.high.get(i).copied().flatten().unwrap_or(f64::NAN),
                low: quote.low.get(i).copied().flatten().unwrap_or(f64::NAN),
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            });
        }

        if bars.is_empty() {
            return Err(DataError::NoUsableData {
                symbol: symbol.to_string(),
                reason: "every row was empty".into(),
            });
        }

        Ok(bars)
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_daily_bars(
        &self,
        symbol: &Symbol,
        lookback_days: u32,
    ) -> Result<FetchResult, DataError> {
        let (start, end) = fetch_window(self.clock.as_ref(), lookback_days);
        let url = Self::chart_url(symbol.as_str(), start, end);

        let resp = get_with_retry(
            &self.client,
            &url,
            &self.circuit_breaker,
            &self.options,
            symbol.as_str(),
        )?;
        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!(
                "failed to parse response for {symbol}: {}",
                redacted(e)
            ))
        })?;

        let bars = Self::parse_response(symbol, chart)?;
        self.circuit_breaker.record_success();

        Ok(FetchResult {
            symbol: symbol.clone(),
            bars,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
