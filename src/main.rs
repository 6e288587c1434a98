//! Scoring Service: binary entrypoint
//! Boots the Axum HTTP server over the unified scoring engine.
//!
//! See `README.md` for the HTTP surface and configuration variables.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Structured logs: `RUST_LOG` filter (default `alchm_scoring=info,warn`),
/// JSON lines when `LOG_FORMAT=json`, compact otherwise.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("alchm_scoring=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    // A subscriber may already be installed by the runtime; keep it.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let router = alchm_scoring::app().await?;
    Ok(router.into())
}
