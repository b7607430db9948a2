//! Shared HTTP plumbing for the network providers: client construction and
//! the retry / backoff / circuit-breaker loop.

use super::circuit_breaker::CircuitBreaker;
use super::clock::Clock;
use super::provider::DataError;
use chrono::{Duration as Days, NaiveDate};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use std::time::Duration;

/// Transport settings for a network provider.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Per-request timeout. This bounds the latency of a single symbol fetch.
    pub timeout: Duration,
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry.
    pub base_delay: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

pub(crate) fn build_client(opts: &HttpOptions) -> Result<Client, DataError> {
    Client::builder()
        .timeout(opts.timeout)
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .build()
        .map_err(|e| DataError::Other(format!("failed to build HTTP client: {}", redacted(e))))
}

/// Error text with the request URL stripped; query strings can carry API keys.
pub(crate) fn redacted(e: reqwest::Error) -> String {
    e.without_url().to_string()
}

/// `(start, end)` dates for a fetch of `lookback_days` ending today.
pub(crate) fn fetch_window(clock: &dyn Clock, lookback_days: u32) -> (NaiveDate, NaiveDate) {
    let end = clock.today_utc();
    (end - Days::days(i64::from(lookback_days)), end)
}

/// GET `url` until a 2xx response arrives, retrying transient failures with
/// exponential backoff.
///
/// 403 trips the breaker immediately; 429 and 5xx count as failures toward it.
pub(crate) fn get_with_retry(
    client: &Client,
    url: &str,
    breaker: &CircuitBreaker,
    opts: &HttpOptions,
    symbol: &str,
) -> Result<Response, DataError> {
    let mut last_error = None;

    for attempt in 0..=opts.max_retries {
        if attempt > 0 {
            let delay = opts.base_delay * 2u32.pow(attempt - 1);
            tracing::debug!("{symbol}: retry {attempt} after {delay:?}");
            std::thread::sleep(delay);
        }

        if !breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        match client.get(url).send() {
            Ok(resp) => {
                let status = resp.status();

                if status == StatusCode::FORBIDDEN {
                    breaker.trip();
                    return Err(DataError::CircuitBreakerTripped);
                }

                if status == StatusCode::TOO_MANY_REQUESTS {
                    breaker.record_failure();
                    let retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(60);
                    last_error = Some(DataError::RateLimited {
                        retry_after_secs: retry_after,
                    });
                    continue;
                }

                if status == StatusCode::UNAUTHORIZED {
                    return Err(DataError::AuthenticationRequired(format!(
                        "HTTP 401 for {symbol}"
                    )));
                }

                if status == StatusCode::NOT_FOUND {
                    return Err(DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    });
                }

                if !status.is_success() {
                    breaker.record_failure();
                    last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                    continue;
                }

                return Ok(resp);
            }
            Err(e) if e.is_connect() || e.is_timeout() => {
                last_error = Some(DataError::NetworkUnreachable(redacted(e)));
            }
            Err(e) => return Err(DataError::NetworkUnreachable(redacted(e))),
        }
    }

    Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
}
