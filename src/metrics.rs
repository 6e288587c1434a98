use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static METRICS: OnceCell<Metrics> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process and publish the cache TTL.
    /// Later calls reuse the installed recorder.
    pub fn init(cache_ttl_secs: u64) -> anyhow::Result<&'static Metrics> {
        let metrics = METRICS.get_or_try_init(|| -> anyhow::Result<Metrics> {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .context("prometheus: install recorder")?;
            describe();
            Ok(Self { handle })
        })?;
        gauge!("astro_cache_ttl_seconds").set(cache_ttl_secs as f64);
        Ok(metrics)
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("astro_tier_attempts_total", "Astronomical source tier attempts, by tier");
    describe_counter!("astro_tier_failures_total", "Astronomical source tier failures, by tier");
    describe_counter!(
        "astro_tier_skipped_total",
        "Remote tiers skipped without a call, by tier and reason (deadline, circuit_open)"
    );
    describe_counter!("astro_cache_hits_total", "Snapshot cache hits");
    describe_counter!("astro_cache_misses_total", "Snapshot cache misses (including expired)");
    describe_counter!("scoring_requests_total", "Items scored");
    describe_counter!("scoring_indeterminate_total", "Indeterminate effect contributions");
    describe_histogram!("scoring_score", "Final scores");
    describe_histogram!("scoring_confidence", "Final confidences");
}
