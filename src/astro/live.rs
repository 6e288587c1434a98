//! Live HTTP tier.
//!
//! `GET {endpoint}?timestamp=<RFC3339>[&lat=&lon=]`, expecting
//! `{"positions": {...}, "aspects": [...]}`. Unknown bodies and aspect types
//! are skipped; a payload without any known body is malformed.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    detect_aspects, AspectKind, AspectObservation, AstroSource, BodyPosition, Planet,
    PositionsData, ZodiacSign,
};
use crate::error::SourceError;
use crate::model::GeoLocation;

pub const LIVE_SOURCE_NAME: &str = "live-api";
pub const LIVE_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Deserialize)]
struct LivePayload {
    positions: BTreeMap<String, LiveBody>,
    #[serde(default)]
    aspects: Vec<LiveAspect>,
}

#[derive(Debug, Deserialize)]
struct LiveBody {
    sign: String,
    degree: f64,
    #[serde(default, alias = "isRetrograde")]
    retrograde: bool,
}

#[derive(Debug, Deserialize)]
struct LiveAspect {
    body1: String,
    body2: String,
    #[serde(alias = "type", alias = "aspect_type")]
    #[serde(rename = "aspectType")]
    aspect_type: String,
    #[serde(default)]
    orb: f64,
}

pub struct LiveSource {
    endpoint: Option<String>,
    http: reqwest::Client,
    timeout: Duration,
}

impl LiveSource {
    /// `endpoint = None` keeps the tier in the chain but always reports
    /// "not configured" so the next tier is tried.
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("alchm-scoring/0.1")
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(target: "astro", error = %e, "falling back to default http client");
                reqwest::Client::new()
            });
        Self {
            endpoint: endpoint.filter(|s| !s.trim().is_empty()),
            http,
            timeout,
        }
    }
}

#[async_trait]
impl AstroSource for LiveSource {
    fn name(&self) -> &'static str {
        LIVE_SOURCE_NAME
    }

    fn confidence(&self) -> f64 {
        LIVE_CONFIDENCE
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn try_resolve(
        &self,
        at: DateTime<Utc>,
        location: Option<GeoLocation>,
    ) -> Result<PositionsData, SourceError> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Err(SourceError::Unavailable("live source not configured".into()));
        };

        let mut query = vec![("timestamp", at.to_rfc3339_opts(SecondsFormat::Secs, true))];
        if let Some(loc) = location {
            query.push(("lat", loc.latitude.to_string()));
            query.push(("lon", loc.longitude.to_string()));
        }

        let resp = self
            .http
            .get(endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    SourceError::Unavailable(e.to_string())
                }
            })?;

        let status = resp.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_rejection(status, &body));
        }
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!("http status {status}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        let positions = parse_payload(&body)?;
        debug!(
            target: "astro",
            bodies = positions.bodies.len(),
            aspects = positions.aspects.len(),
            "live positions received"
        );
        Ok(positions)
    }
}

/// A 400/422 only stops the chain when the body blames the timestamp; any
/// other client error says nothing about the request and the next tier is tried.
fn classify_rejection(status: StatusCode, body: &str) -> SourceError {
    let detail = format!("{status}: {}", body.trim());
    if body.to_ascii_lowercase().contains("timestamp") {
        SourceError::InvalidTimestamp(detail)
    } else {
        SourceError::Unavailable(detail)
    }
}

/// Parse a live response body.
pub fn parse_payload(body: &str) -> Result<PositionsData, SourceError> {
    let payload: LivePayload =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    let mut bodies = BTreeMap::new();
    for (name, raw) in payload.positions {
        let Ok(planet) = name.parse::<Planet>() else {
            debug!(target: "astro", body = %name, "skipping unknown body");
            continue;
        };
        let sign = raw
            .sign
            .parse::<ZodiacSign>()
            .map_err(SourceError::Malformed)?;
        if !raw.degree.is_finite() || !(0.0..=30.0).contains(&raw.degree) {
            return Err(SourceError::Malformed(format!(
                "{planet}: degree {} outside [0, 30]",
                raw.degree
            )));
        }
        let lon = sign.index() as f64 * 30.0 + raw.degree;
        let retro = raw.retrograde && planet.can_retrograde();
        bodies.insert(planet, BodyPosition::from_longitude(lon, retro));
    }
    if bodies.is_empty() {
        return Err(SourceError::Malformed("no known bodies in payload".into()));
    }

    let mut aspects: Vec<AspectObservation> = payload
        .aspects
        .into_iter()
        .filter_map(|a| {
            let body1 = a.body1.parse::<Planet>().ok()?;
            let body2 = a.body2.parse::<Planet>().ok()?;
            let kind = a.aspect_type.parse::<AspectKind>().ok()?;
            if !bodies.contains_key(&body1) || !bodies.contains_key(&body2) || body1 == body2 {
                return None;
            }
            let orb = if a.orb.is_finite() { a.orb.abs() } else { kind.max_orb() };
            Some(AspectObservation {
                body1,
                body2,
                kind,
                orb,
            })
        })
        .collect();
    if aspects.is_empty() {
        aspects = detect_aspects(&bodies);
    }

    Ok(PositionsData { bodies, aspects })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positions_and_aspects() {
        let body = r#"{
            "positions": {
                "Sun": {"sign": "leo", "degree": 10.5, "retrograde": false},
                "mars": {"sign": "Sagittarius", "degree": 12.0, "retrograde": true},
                "northNode": {"sign": "aries", "degree": 3.0}
            },
            "aspects": [
                {"body1": "sun", "body2": "mars", "aspectType": "trine", "orb": 1.5},
                {"body1": "sun", "body2": "chiron", "aspectType": "square", "orb": 0.2}
            ]
        }"#;
        let p = parse_payload(body).unwrap();
        assert_eq!(p.bodies.len(), 2);
        assert_eq!(p.body(Planet::Sun).unwrap().sign, ZodiacSign::Leo);
        assert!(p.body(Planet::Mars).unwrap().retrograde);
        assert_eq!(p.aspects.len(), 1);
        assert_eq!(p.aspects[0].kind, AspectKind::Trine);
    }

    #[test]
    fn sun_retrograde_flag_is_ignored() {
        let body =
            r#"{"positions": {"sun": {"sign": "aries", "degree": 1.0, "retrograde": true}}}"#;
        let p = parse_payload(body).unwrap();
        assert!(!p.body(Planet::Sun).unwrap().retrograde);
    }

    #[test]
    fn derives_aspects_when_missing() {
        let body = r#"{"positions": {
            "sun": {"sign": "aries", "degree": 5.0},
            "jupiter": {"sign": "leo", "degree": 6.0}
        }}"#;
        let p = parse_payload(body).unwrap();
        assert_eq!(p.aspects.len(), 1);
        assert_eq!(p.aspects[0].kind, AspectKind::Trine);
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(parse_payload("not json"), Err(SourceError::Malformed(_))));
        assert!(matches!(
            parse_payload(r#"{"positions": {}}"#),
            Err(SourceError::Malformed(_))
        ));
        assert!(matches!(
            parse_payload(r#"{"positions": {"sun": {"sign": "ophiuchus", "degree": 1.0}}}"#),
            Err(SourceError::Malformed(_))
        ));
        assert!(matches!(
            parse_payload(r#"{"positions": {"sun": {"sign": "aries", "degree": 45.0}}}"#),
            Err(SourceError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn unconfigured_is_retryable() {
        let src = LiveSource::new(Some("  ".into()), Duration::from_millis(50));
        let err = src.try_resolve(Utc::now(), None).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn only_timestamp_rejections_are_final() {
        let err = classify_rejection(
            StatusCode::BAD_REQUEST,
            r#"{"error": "invalid timestamp: year 99999"}"#,
        );
        assert!(matches!(err, SourceError::InvalidTimestamp(_)));
        assert!(!err.is_retryable());

        let err = classify_rejection(StatusCode::UNPROCESSABLE_ENTITY, "missing api key");
        assert!(matches!(err, SourceError::Unavailable(_)));
        assert!(err.is_retryable());
    }
}
