// tests/metrics.rs
use axum::body::{self, Body};
use axum::Router;
use http::{Request, StatusCode};
use serde_json::json;
use serial_test::serial;
use tower::ServiceExt;

// Build full in-process app (includes /metrics when gated via env).
async fn build_app() -> Router {
    alchm_scoring::app()
        .await
        .expect("app() should build Router in tests")
}

// Ensure the metrics route is enabled and no live tier is contacted.
fn set_metrics_env() {
    std::env::set_var("METRICS_ROUTE", "1");
    std::env::remove_var("ASTRO_LIVE_URL");
    std::env::remove_var("SCORING_TABLES_PATH");
    std::env::set_var("ASTRO_CACHE_TTL_SECS", "600");
}

fn score_payload() -> String {
    json!({
        "item": {
            "name": "ginger",
            "category": "ingredient",
            "elements": { "fire": 0.5, "water": 0.1, "earth": 0.2, "air": 0.2 },
            "ruling_bodies": ["mars"]
        },
        "timestamp": "2024-10-01T12:00:00Z"
    })
    .to_string()
}

async fn scrape(app: Router) -> String {
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap(); // 1 MiB
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
#[serial]
async fn metrics_endpoint_contains_expected_series() {
    set_metrics_env();
    let app = build_app().await;

    // Two identical requests: miss then hit.
    for _ in 0..2 {
        let r = app
            .clone()
            .oneshot(
                Request::post("/score")
                    .header("content-type", "application/json")
                    .body(Body::from(score_payload()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(r.status(), StatusCode::OK);
    }

    let text = scrape(app).await;
    for needle in [
        "astro_cache_hits_total",
        "astro_cache_misses_total",
        "astro_tier_attempts_total",
        "scoring_requests_total",
        "scoring_score",
        "astro_cache_ttl_seconds",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}

#[tokio::test]
#[serial]
async fn metrics_route_absent_by_default() {
    std::env::remove_var("METRICS_ROUTE");
    std::env::remove_var("ASTRO_LIVE_URL");
    std::env::remove_var("SCORING_TABLES_PATH");
    let app = build_app().await;

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
