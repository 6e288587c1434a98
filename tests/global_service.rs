// tests/global_service.rs
//
// The process-wide service behind the free `score_recommendation`.
// Runs in its own process, so the environment below is what `global()` sees.

use serial_test::serial;

use alchm_scoring::astro::ephemeris::EPHEMERIS_SOURCE_NAME;
use alchm_scoring::model::{Category, ElementalComposition, ScoringContext, ScoringItem};
use alchm_scoring::{score_recommendation, ScoringService};

fn offline_env() {
    std::env::remove_var("ASTRO_LIVE_URL");
    std::env::remove_var("SCORING_TABLES_PATH");
    std::env::remove_var("ASTRO_CACHE_TTL_SECS");
}

fn ctx(name: &str) -> ScoringContext {
    let item = ScoringItem::new(name, Category::Recipe, ElementalComposition::balanced());
    ScoringContext::builder(item)
        .at_iso("2024-12-21T20:15:00Z")
        .expect("timestamp")
        .build()
        .expect("context")
}

#[tokio::test]
#[serial]
async fn global_is_a_single_instance() {
    offline_env();
    let a = ScoringService::global();
    let b = ScoringService::global();
    assert!(std::ptr::eq(a, b));
    assert_eq!(a.chain().tier_names().len(), 3);
}

#[tokio::test]
#[serial]
async fn free_function_scores_through_the_global_service() {
    offline_env();
    let before = ScoringService::global().chain().resolution_count();

    let first = score_recommendation(&ctx("stew")).await;
    let second = score_recommendation(&ctx("pie")).await;

    assert_eq!(first.metadata.sources, vec![EPHEMERIS_SOURCE_NAME.to_string()]);
    assert!((0.0..=1.0).contains(&first.score));
    assert!(first.confidence > 0.0);
    assert_eq!(second.item, "pie");
    // Same hour bucket: the second call is served from the shared cache.
    let after = ScoringService::global().chain().resolution_count();
    assert!(after - before <= 1, "resolved {} times", after - before);
}
