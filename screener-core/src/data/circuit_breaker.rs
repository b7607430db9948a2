//! Circuit breaker shared by all workers hitting one provider.
//!
//! A screen fans out thousands of requests. Once the provider answers 403
//! (IP ban) or keeps answering 429, every further request is wasted, so the
//! breaker opens and refuses requests for a cooldown period. Workers then fail
//! their symbols immediately instead of each burning the full retry budget.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { consecutive_failures: u32 },
    Open { tripped_at: Instant },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<State>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            state: Mutex::new(State::Closed {
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// 30-minute cooldown, trips after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(30 * 60), 3)
    }

    // A panicking worker must not wedge every other worker on a poisoned lock.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check if requests are currently allowed. Closes the breaker when the
    /// cooldown has elapsed.
    pub fn is_allowed(&self) -> bool {
        let mut state = self.lock();
        match *state {
            State::Closed { .. } => true,
            State::Open { tripped_at } if tripped_at.elapsed() >= self.cooldown => {
                tracing::info!("circuit breaker cooldown elapsed, resuming requests");
                *state = State::Closed {
                    consecutive_failures: 0,
                };
                true
            }
            State::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.lock();
        if let State::Closed { .. } = *state {
            *state = State::Closed {
                consecutive_failures: 0,
            };
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.lock();
        if let State::Closed {
            consecutive_failures,
        } = *state
        {
            let failures = consecutive_failures + 1;
            if failures >= self.failure_threshold {
                tracing::warn!("circuit breaker tripped after {failures} consecutive failures");
                *state = State::Open {
                    tripped_at: Instant::now(),
                };
            } else {
                *state = State::Closed {
                    consecutive_failures: failures,
                };
            }
        }
    }

    /// Open immediately (HTTP 403).
    pub fn trip(&self) {
        tracing::warn!("circuit breaker tripped by provider ban");
        *self.lock() = State::Open {
            tripped_at: Instant::now(),
        };
    }

    /// Remaining cooldown time (zero if closed).
    pub fn remaining_cooldown(&self) -> Duration {
        match *self.lock() {
            State::Closed { .. } => Duration::ZERO,
            State::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}
