//! Date source for cache freshness decisions.

use chrono::{NaiveDate, Utc};

pub trait Clock: Send + Sync {
    /// Current calendar date in UTC.
    fn today_utc(&self) -> NaiveDate;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today_utc(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today_utc(&self) -> NaiveDate {
        self.0
    }
}
