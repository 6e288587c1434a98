//! Static last-resort tier: a fixed, known-good snapshot (28 March 2025).
//! It never fails and carries the lowest confidence.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AstroSource, BodyPosition, Planet, PositionsData};
use crate::error::SourceError;
use crate::model::GeoLocation;

pub const STATIC_SOURCE_NAME: &str = "static-fallback";
pub const STATIC_CONFIDENCE: f64 = 0.1;

/// `(body, ecliptic longitude, retrograde)`.
const FIXED_POSITIONS: [(Planet, f64, bool); 10] = [
    (Planet::Sun, 8.5, false),
    (Planet::Moon, 1.57, false),
    (Planet::Mercury, 0.85, true),
    (Planet::Venus, 359.08, true),
    (Planet::Mars, 112.63, false),
    (Planet::Jupiter, 75.52, false),
    (Planet::Saturn, 354.12, false),
    (Planet::Uranus, 54.62, false),
    (Planet::Neptune, 359.93, false),
    (Planet::Pluto, 303.5, false),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSource;

impl StaticSource {
    /// The fixed snapshot, independent of the requested time.
    pub fn positions() -> PositionsData {
        let bodies: BTreeMap<Planet, BodyPosition> = FIXED_POSITIONS
            .iter()
            .map(|(p, lon, retro)| (*p, BodyPosition::from_longitude(*lon, *retro)))
            .collect();
        PositionsData::with_detected_aspects(bodies)
    }
}

#[async_trait]
impl AstroSource for StaticSource {
    fn name(&self) -> &'static str {
        STATIC_SOURCE_NAME
    }

    fn confidence(&self) -> f64 {
        STATIC_CONFIDENCE
    }

    async fn try_resolve(
        &self,
        _at: DateTime<Utc>,
        _location: Option<GeoLocation>,
    ) -> Result<PositionsData, SourceError> {
        Ok(Self::positions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::{AspectKind, ZodiacSign};

    #[test]
    fn fixed_snapshot_is_complete() {
        let p = StaticSource::positions();
        assert_eq!(p.bodies.len(), Planet::ALL.len());
        assert_eq!(p.body(Planet::Sun).unwrap().sign, ZodiacSign::Aries);
        assert_eq!(p.body(Planet::Venus).unwrap().sign, ZodiacSign::Pisces);
        assert!(p.body(Planet::Mercury).unwrap().retrograde);
    }

    #[test]
    fn fixed_snapshot_has_derived_aspects() {
        let p = StaticSource::positions();
        // Sun 8.5 and Moon 1.57 are within a conjunction orb.
        assert!(p.aspects.iter().any(|a| a.kind == AspectKind::Conjunction
            && a.involves(Planet::Sun)
            && a.involves(Planet::Moon)));
    }

    #[tokio::test]
    async fn never_fails() {
        let out = StaticSource.try_resolve(Utc::now(), None).await;
        assert!(out.is_ok());
    }
}
