//! # Unified scoring service
//!
//! Facade over the source chain, snapshot cache and coefficient tables.
//! Holds no per-request state: every call resolves (or reuses) one immutable
//! `CelestialSnapshot` and runs the effects and aggregation against it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::aggregate::{aggregate, ScoringResult};
use crate::astro::{AstroCache, CacheKey, SourceChain};
use crate::config::{self, ScoringTables, ServiceConfig};
use crate::effects::evaluate_all;
use crate::error::{ChainError, ScoringError};
use crate::model::{GeoLocation, ScoringContext, ScoringItem};
use crate::snapshot::CelestialSnapshot;

pub type SnapshotCache = AstroCache<CelestialSnapshot>;

static GLOBAL: OnceCell<ScoringService> = OnceCell::new();

pub struct ScoringService {
    chain: Arc<SourceChain>,
    cache: Arc<SnapshotCache>,
    tables: Arc<ScoringTables>,
}

impl ScoringService {
    pub fn new(
        chain: Arc<SourceChain>,
        cache: Arc<SnapshotCache>,
        tables: Arc<ScoringTables>,
    ) -> Self {
        Self {
            chain,
            cache,
            tables,
        }
    }

    /// Standard chain and a fresh cache built from `cfg`.
    pub fn from_config(cfg: &ServiceConfig, tables: ScoringTables) -> Self {
        Self::new(
            Arc::new(SourceChain::standard(cfg)),
            Arc::new(AstroCache::new(cfg.cache_ttl)),
            Arc::new(tables),
        )
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let cfg = ServiceConfig::from_env().context("reading service configuration")?;
        let tables = config::load_tables_default().context("loading coefficient tables")?;
        let service = Self::from_config(&cfg, tables);
        info!(
            target: "scoring",
            tiers = ?service.chain.tier_names(),
            live = cfg.live_url.is_some(),
            tier_timeout_ms = cfg.tier_timeout.as_millis() as u64,
            cache_ttl_s = cfg.cache_ttl.as_secs(),
            breaker_threshold = cfg.breaker_threshold,
            "scoring service configured"
        );
        Ok(service)
    }

    /// Process-wide instance, initialized from the environment on first use.
    /// Bad configuration falls back to defaults with a warning.
    pub fn global() -> &'static ScoringService {
        GLOBAL.get_or_init(|| {
            Self::from_env().unwrap_or_else(|e| {
                warn!(
                    target: "scoring",
                    error = %format!("{e:#}"),
                    "falling back to default scoring configuration"
                );
                Self::from_config(&ServiceConfig::default(), config::default_seed())
            })
        })
    }

    pub fn chain(&self) -> &SourceChain {
        &self.chain
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn tables(&self) -> &ScoringTables {
        &self.tables
    }

    /// Snapshot for the hour bucket of `at` (and rounded `location`).
    /// Failed resolutions are not cached.
    pub async fn snapshot(
        &self,
        at: DateTime<Utc>,
        location: Option<GeoLocation>,
        budget: Option<Duration>,
    ) -> Arc<CelestialSnapshot> {
        let key = CacheKey::canonical(at, location);
        if let Some(hit) = self.cache.get(&key) {
            return hit;
        }

        let resolved_for = key.canonical_timestamp();
        let deadline = budget.map(|b| tokio::time::Instant::now() + b);
        match self
            .chain
            .resolve(resolved_for, key.canonical_location(), deadline)
            .await
        {
            Ok(resolution) => {
                let snap = Arc::new(CelestialSnapshot::from_resolution(
                    resolution,
                    resolved_for,
                    &self.tables,
                ));
                self.cache.insert(key, Arc::clone(&snap));
                snap
            }
            Err(err) => {
                warn!(target: "scoring", error = %err, "astronomical resolution failed");
                let warnings = match err {
                    ChainError::Rejected { source_name, error } => {
                        vec![format!("{source_name}: {error}")]
                    }
                    ChainError::Exhausted { failures } => failures,
                };
                Arc::new(CelestialSnapshot::unresolved(resolved_for, &self.tables, warnings))
            }
        }
    }

    pub async fn score_recommendation(&self, ctx: &ScoringContext) -> ScoringResult {
        counter!("scoring_requests_total").increment(1);
        let snapshot = self
            .snapshot(ctx.timestamp(), ctx.location(), ctx.options().deadline)
            .await;
        self.score_with(&snapshot, ctx)
    }

    /// Score several items against one resolution. All items are validated
    /// before anything is resolved.
    pub async fn score_batch(
        &self,
        ctx: &ScoringContext,
        items: &[ScoringItem],
    ) -> Result<Vec<ScoringResult>, ScoringError> {
        let contexts = items
            .iter()
            .map(|item| ctx.with_item(item.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        if contexts.is_empty() {
            return Ok(Vec::new());
        }

        counter!("scoring_requests_total").increment(contexts.len() as u64);
        let snapshot = self
            .snapshot(ctx.timestamp(), ctx.location(), ctx.options().deadline)
            .await;
        Ok(contexts
            .iter()
            .map(|c| self.score_with(&snapshot, c))
            .collect())
    }

    fn score_with(&self, snapshot: &CelestialSnapshot, ctx: &ScoringContext) -> ScoringResult {
        let contributions = evaluate_all(snapshot, ctx, &self.tables);
        let result = aggregate(ctx.item(), contributions, &ctx.options().weights, snapshot);
        info!(
            target: "scoring",
            item = %result.item,
            category = %result.category,
            score = result.score,
            confidence = result.confidence,
            source = snapshot.source,
            "scored"
        );
        result
    }
}

/// Score with the process-wide service.
pub async fn score_recommendation(ctx: &ScoringContext) -> ScoringResult {
    ScoringService::global().score_recommendation(ctx).await
}
