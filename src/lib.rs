// src/lib.rs
// Public library surface: scoring engine, HTTP router, and `app()` for the binary and tests.

pub mod aggregate;
pub mod alchemy;
pub mod api;
pub mod astro;
pub mod config;
pub mod effects;
pub mod error;
pub mod metrics;
pub mod model;
pub mod service;
pub mod snapshot;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{EffectWeights, ResultMetadata, ScoringResult};
pub use crate::effects::{EffectContribution, EffectKind};
pub use crate::error::{ChainError, ConfigError, ScoringError, SourceError};
pub use crate::model::{
    Category, Element, ElementalComposition, GeoLocation, ScoringContext, ScoringItem, Season,
    UserPreferences,
};
pub use crate::service::{score_recommendation, ScoringService};
pub use crate::snapshot::CelestialSnapshot;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tracing::info;

use crate::config::ServiceConfig;

/// Build the full router from the environment: scoring routes, plus
/// `/metrics` when `METRICS_ROUTE=1`.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = ServiceConfig::from_env().context("reading service configuration")?;
    let tables = config::load_tables_default().context("loading coefficient tables")?;
    let service = Arc::new(ScoringService::from_config(&cfg, tables));
    info!(target: "api", tiers = ?service.chain().tier_names(), "scoring service ready");

    let mut router = api::router(service);
    if cfg.metrics_route {
        let m = crate::metrics::Metrics::init(cfg.cache_ttl.as_secs())?;
        router = router.merge(m.router());
        info!(target: "api", "metrics route enabled");
    }
    Ok(router)
}
