//! Circuit breaker for provider rate limits and bans.
//!
//! Repeated failures (or a single ban response) open the breaker and all
//! requests are refused until a cooldown elapses. Keeps a sequential
//! symbol-by-symbol pull from hammering a provider that has already said no.

use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30 * 60);
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

#[derive(Debug)]
struct BreakerInner {
    opened_at: Option<Instant>,
    consecutive_failures: u32,
}

/// Shared breaker guarding one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                opened_at: None,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold,
        }
    }

    /// Default breaker: 30-minute cooldown, opens after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(DEFAULT_COOLDOWN, DEFAULT_FAILURE_THRESHOLD)
    }

    /// Whether requests are currently allowed. An expired cooldown closes
    /// the breaker again as a side effect.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.opened_at {
            None => true,
            Some(opened_at) => {
                if opened_at.elapsed() >= self.cooldown {
                    inner.opened_at = None;
                    inner.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// A request succeeded; the failure streak resets.
    pub fn record_success(&self) {
        self.inner.lock().unwrap().consecutive_failures = 0;
    }

    /// A request failed. Hitting the threshold opens the breaker.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Open the breaker immediately (ban response from the provider).
    pub fn trip(&self) {
        self.inner.lock().unwrap().opened_at = Some(Instant::now());
    }

    /// Remaining cooldown, zero when closed.
    pub fn remaining_cooldown(&self) -> Duration {
        let inner = self.inner.lock().unwrap();
        match inner.opened_at {
            None => Duration::ZERO,
            Some(opened_at) => self.cooldown.saturating_sub(opened_at.elapsed()),
        }
    }
}
