//! Ordered fallback over `AstroSource` tiers.
//!
//! Each tier gets at most `tier_timeout` (less if the caller's deadline is
//! closer). Retryable failures move on to the next tier; a non-retryable one
//! stops the chain. Once the deadline has passed, remote tiers are skipped
//! without being called; so are remote tiers whose circuit breaker is open.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::breaker::{CircuitBreaker, DEFAULT_COOLDOWN, DEFAULT_FAILURE_THRESHOLD};
use super::{AstroSource, EphemerisSource, LiveSource, PositionsData, StaticSource};
use crate::config::ServiceConfig;
use crate::error::{ChainError, SourceError};
use crate::model::GeoLocation;

pub const DEFAULT_TIER_TIMEOUT: Duration = Duration::from_secs(2);

/// Positions plus provenance from the first tier that succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub positions: PositionsData,
    pub confidence: f64,
    pub source: &'static str,
    /// Failures of the tiers tried before `source`.
    pub warnings: Vec<String>,
}

pub struct SourceChain {
    tiers: Vec<Arc<dyn AstroSource>>,
    /// One per tier; only remote tiers have one.
    breakers: Vec<Option<CircuitBreaker>>,
    tier_timeout: Duration,
    resolutions: AtomicU64,
}

impl SourceChain {
    pub fn new(tiers: Vec<Arc<dyn AstroSource>>, tier_timeout: Duration) -> Self {
        Self {
            breakers: Vec::new(),
            tiers,
            tier_timeout,
            resolutions: AtomicU64::new(0),
        }
        .with_breaker(DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOLDOWN)
    }

    /// Replace the remote tiers' breakers. A `threshold` of 0 disables them.
    pub fn with_breaker(mut self, threshold: u32, cooldown: Duration) -> Self {
        self.breakers = self
            .tiers
            .iter()
            .map(|t| t.is_remote().then(|| CircuitBreaker::new(threshold, cooldown)))
            .collect();
        self
    }

    /// live → deterministic ephemeris → static fallback.
    pub fn standard(cfg: &ServiceConfig) -> Self {
        let tiers: Vec<Arc<dyn AstroSource>> = vec![
            Arc::new(LiveSource::new(cfg.live_url.clone(), cfg.live_timeout)),
            Arc::new(EphemerisSource),
            Arc::new(StaticSource),
        ];
        Self::new(tiers, cfg.tier_timeout).with_breaker(cfg.breaker_threshold, cfg.breaker_cooldown)
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Number of times `resolve` has been entered.
    pub fn resolution_count(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    pub async fn resolve(
        &self,
        at: DateTime<Utc>,
        location: Option<GeoLocation>,
        deadline: Option<Instant>,
    ) -> Result<Resolution, ChainError> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        let mut warnings = Vec::new();

        for (tier, breaker) in self.tiers.iter().zip(&self.breakers) {
            let name = tier.name();
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));

            if tier.is_remote() && remaining.is_some_and(|r| r.is_zero()) {
                counter!("astro_tier_skipped_total", "tier" => name, "reason" => "deadline")
                    .increment(1);
                debug!(target: "astro", tier = name, "deadline passed, skipping remote tier");
                warnings.push(format!("{name}: skipped, deadline exceeded"));
                continue;
            }

            if breaker.as_ref().is_some_and(|b| !b.allow(Instant::now())) {
                counter!("astro_tier_skipped_total", "tier" => name, "reason" => "circuit_open")
                    .increment(1);
                debug!(target: "astro", tier = name, "circuit open, skipping remote tier");
                warnings.push(format!("{name}: skipped, circuit open"));
                continue;
            }

            let budget = match remaining {
                Some(r) if tier.is_remote() => r.min(self.tier_timeout),
                _ => self.tier_timeout,
            };

            counter!("astro_tier_attempts_total", "tier" => name).increment(1);
            let outcome = match tokio::time::timeout(budget, tier.try_resolve(at, location)).await {
                Ok(res) => res,
                Err(_) => Err(SourceError::Timeout(budget.as_millis() as u64)),
            };

            if let Some(b) = breaker {
                match &outcome {
                    Err(error) if error.is_retryable() => {
                        if b.record_failure(Instant::now()) {
                            warn!(target: "astro", tier = name, "circuit opened");
                        }
                    }
                    // A rejection is still an answer from the endpoint.
                    _ => b.record_success(),
                }
            }

            match outcome {
                Ok(positions) => {
                    info!(
                        target: "astro",
                        tier = name,
                        bodies = positions.bodies.len(),
                        "positions resolved"
                    );
                    return Ok(Resolution {
                        positions,
                        confidence: tier.confidence(),
                        source: name,
                        warnings,
                    });
                }
                Err(error) if error.is_retryable() => {
                    counter!("astro_tier_failures_total", "tier" => name).increment(1);
                    warn!(target: "astro", tier = name, %error, "tier failed, trying next");
                    warnings.push(format!("{name}: {error}"));
                }
                Err(error) => {
                    counter!("astro_tier_failures_total", "tier" => name).increment(1);
                    warn!(target: "astro", tier = name, %error, "tier rejected request");
                    return Err(ChainError::Rejected {
                        source_name: name,
                        error,
                    });
                }
            }
        }

        Err(ChainError::Exhausted { failures: warnings })
    }
}
