//! Per-tier circuit breaker.
//!
//! Closed until `threshold` consecutive failures, then open for `cooldown`.
//! After the cooldown one half-open trial goes through: success closes the
//! breaker, failure opens it for another cooldown. A threshold of 0 never opens.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Default)]
struct Inner {
    failures: u32,
    opened_at: Option<Instant>,
    /// When the current half-open trial was admitted.
    trial_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Whether a call may go through at `now`. Admits a single half-open
    /// trial once the cooldown has elapsed; a trial that never reports back
    /// is replaced after another cooldown.
    pub fn allow(&self, now: Instant) -> bool {
        let mut s = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let Some(opened_at) = s.opened_at else {
            return true;
        };
        if now.saturating_duration_since(opened_at) < self.cooldown {
            return false;
        }
        match s.trial_at {
            Some(t) if now.saturating_duration_since(t) < self.cooldown => false,
            _ => {
                s.trial_at = Some(now);
                true
            }
        }
    }

    pub fn record_success(&self) {
        let mut s = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        *s = Inner::default();
    }

    /// Returns `true` when this failure opened (or re-opened) the breaker.
    pub fn record_failure(&self, now: Instant) -> bool {
        if self.threshold == 0 {
            return false;
        }
        let mut s = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if s.trial_at.take().is_some() {
            s.opened_at = Some(now);
            return true;
        }
        s.failures = s.failures.saturating_add(1);
        if s.opened_at.is_none() && s.failures >= self.threshold {
            s.opened_at = Some(now);
            return true;
        }
        false
    }

    pub fn state(&self, now: Instant) -> BreakerState {
        let s = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        match s.opened_at {
            None => BreakerState::Closed,
            Some(_) if s.trial_at.is_some() => BreakerState::HalfOpen,
            Some(t) if now.saturating_duration_since(t) >= self.cooldown => BreakerState::HalfOpen,
            Some(_) => BreakerState::Open,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOLDOWN)
    }
}
