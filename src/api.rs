//! Thin HTTP surface over `ScoringService`.
//!
//! - `POST /score`        one item
//! - `POST /score/batch`  several items, one resolution
//! - `GET  /state`        resolved snapshot (and planetary hour) for `?timestamp=&lat=&lon=`
//! - `GET  /health`

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::debug;

use crate::aggregate::{EffectWeights, ScoringResult};
use crate::astro::{planetary_hour, PlanetaryHour};
use crate::error::ScoringError;
use crate::model::{
    GeoLocation, ScoringContext, ScoringContextBuilder, ScoringItem, UserPreferences, MAX_YEAR,
    MIN_YEAR,
};
use crate::service::ScoringService;
use crate::snapshot::CelestialSnapshot;

#[derive(Clone)]
pub struct AppState {
    service: Arc<ScoringService>,
}

impl AppState {
    pub fn new(service: Arc<ScoringService>) -> Self {
        Self { service }
    }
}

pub fn router(service: Arc<ScoringService>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/score", post(score))
        .route("/score/batch", post(score_batch))
        .route("/state", get(state))
        .layer(CorsLayer::very_permissive())
        .with_state(AppState::new(service))
}

/// Client errors, rendered as `400 {"error": "..."}`.
#[derive(Debug)]
pub struct AppError(String);

impl From<ScoringError> for AppError {
    fn from(e: ScoringError) -> Self {
        Self(e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        Self(e.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        debug!(target: "api", error = %self.0, "rejected request");
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": self.0 })),
        )
            .into_response()
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LocationIn {
    latitude: f64,
    longitude: f64,
}

/// Fields shared by single and batch requests.
#[derive(Debug, Deserialize)]
struct RequestOptions {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    location: Option<LocationIn>,
    #[serde(default)]
    preferences: Option<UserPreferences>,
    #[serde(default)]
    weights: Option<EffectWeights>,
    #[serde(default)]
    deadline_ms: Option<u64>,
}

impl RequestOptions {
    fn context(self, item: ScoringItem) -> Result<ScoringContext, ScoringError> {
        let mut b: ScoringContextBuilder = ScoringContext::builder(item);
        if let Some(ts) = self.timestamp.as_deref() {
            b = b.at_iso(ts)?;
        }
        if let Some(loc) = self.location {
            b = b.location(GeoLocation::new(loc.latitude, loc.longitude)?);
        }
        if let Some(p) = self.preferences {
            b = b.preferences(p);
        }
        if let Some(w) = self.weights {
            b = b.weights(w);
        }
        if let Some(ms) = self.deadline_ms {
            b = b.deadline(Duration::from_millis(ms));
        }
        b.build()
    }
}

#[derive(Debug, Deserialize)]
struct ScoreRequest {
    item: ScoringItem,
    #[serde(flatten)]
    options: RequestOptions,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    items: Vec<ScoringItem>,
    #[serde(flatten)]
    options: RequestOptions,
}

#[derive(Serialize)]
struct BatchResponse {
    results: Vec<ScoringResult>,
}

async fn score(
    State(app): State<AppState>,
    payload: Result<Json<ScoreRequest>, JsonRejection>,
) -> Result<Json<ScoringResult>, AppError> {
    let Json(req) = payload?;
    let ctx = req.options.context(req.item)?;
    Ok(Json(app.service.score_recommendation(&ctx).await))
}

async fn score_batch(
    State(app): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, AppError> {
    let Json(req) = payload?;
    let Some(first) = req.items.first().cloned() else {
        return Ok(Json(BatchResponse { results: Vec::new() }));
    };
    let ctx = req.options.context(first)?;
    let results = app.service.score_batch(&ctx, &req.items).await?;
    Ok(Json(BatchResponse { results }))
}

#[derive(Debug, Deserialize)]
struct StateQuery {
    timestamp: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Serialize)]
struct StateResponse {
    #[serde(flatten)]
    snapshot: CelestialSnapshot,
    /// Only with a location, and only where the Sun rises and sets.
    #[serde(skip_serializing_if = "Option::is_none")]
    planetary_hour: Option<PlanetaryHour>,
}

async fn state(
    State(app): State<AppState>,
    Query(q): Query<StateQuery>,
) -> Result<Json<StateResponse>, AppError> {
    let at = match q.timestamp.as_deref() {
        Some(ts) => DateTime::parse_from_rfc3339(ts.trim())
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| ScoringError::invalid("timestamp", format!("`{ts}`: {e}")))?,
        None => Utc::now(),
    };
    if !(MIN_YEAR..=MAX_YEAR).contains(&at.year()) {
        let reason = format!("year {} outside {MIN_YEAR}..={MAX_YEAR}", at.year());
        return Err(ScoringError::invalid("timestamp", reason).into());
    }
    let location = match (q.lat, q.lon) {
        (Some(lat), Some(lon)) => Some(GeoLocation::new(lat, lon)?),
        (None, None) => None,
        _ => {
            let reason = "lat and lon must be given together";
            return Err(ScoringError::invalid("location", reason).into());
        }
    };
    let snap = app.service.snapshot(at, location, None).await;
    Ok(Json(StateResponse {
        snapshot: snap.as_ref().clone(),
        planetary_hour: location.and_then(|loc| planetary_hour(at, loc)),
    }))
}
