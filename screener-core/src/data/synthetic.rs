//! Deterministic synthetic provider for offline runs and demos.
//!
//! Each symbol gets its own random walk seeded from a BLAKE3 hash of the
//! ticker, so repeated runs see identical data. Results produced on synthetic
//! data say nothing about real markets.

use super::clock::Clock;
use super::provider::{DataError, DataProvider, DataSource, FetchResult};
use crate::domain::{Bar, Symbol};
use chrono::{Datelike, Duration, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

pub struct SyntheticProvider {
    clock: Arc<dyn Clock>,
}

impl SyntheticProvider {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn generate(&self, symbol: &Symbol, lookback_days: u32) -> Vec<Bar> {
        let seed: [u8; 32] = *blake3::hash(symbol.as_str().as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let end = self.clock.today_utc();
        let mut current = end - Duration::days(i64::from(lookback_days));
        let mut price: f64 = rng.gen_range(8.0..400.0);
        let base_volume: u64 = rng.gen_range(200_000..5_000_000);
        let mut bars = Vec::new();

        while current <= end {
            if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                current += Duration::days(1);
                continue;
            }

            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            let open = price;
            let close = (price * (1.0 + daily_return)).max(0.01);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            // Occasional volume bursts so the spike filter has something to find.
            let burst = if rng.gen_bool(0.03) { 3.0 } else { 1.0 };
            let volume = (base_volume as f64 * rng.gen_range(0.6..1.4) * burst) as u64;

            bars.push(Bar {
                date: current,
                open,
                high,
                low,
                close,
                volume,
            });

            price = close;
            current += Duration::days(1);
        }

        bars
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_daily_bars(
        &self,
        symbol: &Symbol,
        lookback_days: u32,
    ) -> Result<FetchResult, DataError> {
        let bars = self.generate(symbol, lookback_days);
        if bars.is_empty() {
            return Err(DataError::NoUsableData {
                symbol: symbol.to_string(),
                reason: "lookback window contains no weekdays".into(),
            });
        }
        Ok(FetchResult {
            symbol: symbol.clone(),
            bars,
            source: DataSource::Synthetic,
        })
    }
}
