//! # Astronomical data
//!
//! Planet/sign/aspect vocabulary, the `PositionsData` snapshot shared by every
//! tier, and the tiered source chain that produces it:
//!
//! - `live`      : HTTP service (highest confidence)
//! - `ephemeris` : deterministic offline approximation
//! - `fallback`  : fixed positions, never fails
//! - `chain`     : ordered tier iteration with timeouts and deadline
//! - `breaker`   : per-tier circuit breaker for remote tiers
//! - `cache`     : hour-bucketed TTL cache of resolved snapshots
//! - `lunar`     : synodic phase of the Moon
//! - `hours`     : Chaldean planetary hours from local sunrise and sunset

pub mod breaker;
pub mod cache;
pub mod chain;
pub mod ephemeris;
pub mod fallback;
pub mod hours;
pub mod live;
pub mod lunar;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::model::{Element, GeoLocation};

pub use breaker::{BreakerState, CircuitBreaker};
pub use cache::{AstroCache, CacheKey};
pub use chain::{Resolution, SourceChain};
pub use ephemeris::EphemerisSource;
pub use fallback::StaticSource;
pub use hours::{planetary_hour, PlanetaryHour};
pub use live::LiveSource;
pub use lunar::{lunar_info, LunarInfo, LunarPhase};

/// Celestial bodies the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Planet {
    #[serde(alias = "Sun")]
    Sun,
    #[serde(alias = "Moon")]
    Moon,
    #[serde(alias = "Mercury")]
    Mercury,
    #[serde(alias = "Venus")]
    Venus,
    #[serde(alias = "Mars")]
    Mars,
    #[serde(alias = "Jupiter")]
    Jupiter,
    #[serde(alias = "Saturn")]
    Saturn,
    #[serde(alias = "Uranus")]
    Uranus,
    #[serde(alias = "Neptune")]
    Neptune,
    #[serde(alias = "Pluto")]
    Pluto,
}

impl Planet {
    pub const ALL: [Planet; 10] = [
        Planet::Sun,
        Planet::Moon,
        Planet::Mercury,
        Planet::Venus,
        Planet::Mars,
        Planet::Jupiter,
        Planet::Saturn,
        Planet::Uranus,
        Planet::Neptune,
        Planet::Pluto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Planet::Sun => "sun",
            Planet::Moon => "moon",
            Planet::Mercury => "mercury",
            Planet::Venus => "venus",
            Planet::Mars => "mars",
            Planet::Jupiter => "jupiter",
            Planet::Saturn => "saturn",
            Planet::Uranus => "uranus",
            Planet::Neptune => "neptune",
            Planet::Pluto => "pluto",
        }
    }

    /// The luminaries never station retrograde.
    pub fn can_retrograde(&self) -> bool {
        !matches!(self, Planet::Sun | Planet::Moon)
    }
}

impl fmt::Display for Planet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Planet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Planet::ALL
            .into_iter()
            .find(|p| p.as_str() == key)
            .ok_or_else(|| format!("unknown body `{s}`"))
    }
}

/// Tropical zodiac signs, Aries first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZodiacSign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 12] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Sign and degree-within-sign for an ecliptic longitude (any real value).
    pub fn from_longitude(longitude: f64) -> (ZodiacSign, f64) {
        let lon = normalize_degrees(longitude);
        let idx = ((lon / 30.0).floor() as usize).min(11);
        (Self::ALL[idx], lon - idx as f64 * 30.0)
    }

    /// Triplicity element.
    pub fn element(&self) -> Element {
        match self.index() % 4 {
            0 => Element::Fire,
            1 => Element::Earth,
            2 => Element::Air,
            _ => Element::Water,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ZodiacSign::Aries => "aries",
            ZodiacSign::Taurus => "taurus",
            ZodiacSign::Gemini => "gemini",
            ZodiacSign::Cancer => "cancer",
            ZodiacSign::Leo => "leo",
            ZodiacSign::Virgo => "virgo",
            ZodiacSign::Libra => "libra",
            ZodiacSign::Scorpio => "scorpio",
            ZodiacSign::Sagittarius => "sagittarius",
            ZodiacSign::Capricorn => "capricorn",
            ZodiacSign::Aquarius => "aquarius",
            ZodiacSign::Pisces => "pisces",
        }
    }
}

impl FromStr for ZodiacSign {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        ZodiacSign::ALL
            .into_iter()
            .find(|z| z.as_str() == key)
            .ok_or_else(|| format!("unknown sign `{s}`"))
    }
}

/// Major (Ptolemaic) aspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectKind {
    Conjunction,
    Sextile,
    Square,
    Trine,
    Opposition,
}

impl AspectKind {
    pub const ALL: [AspectKind; 5] = [
        AspectKind::Conjunction,
        AspectKind::Sextile,
        AspectKind::Square,
        AspectKind::Trine,
        AspectKind::Opposition,
    ];

    pub fn angle(&self) -> f64 {
        match self {
            AspectKind::Conjunction => 0.0,
            AspectKind::Sextile => 60.0,
            AspectKind::Square => 90.0,
            AspectKind::Trine => 120.0,
            AspectKind::Opposition => 180.0,
        }
    }

    /// Largest orb (degrees) at which the aspect still counts.
    pub fn max_orb(&self) -> f64 {
        match self {
            AspectKind::Sextile => 6.0,
            _ => 8.0,
        }
    }

    pub fn is_harmonious(&self) -> bool {
        matches!(self, AspectKind::Trine | AspectKind::Sextile)
    }

    pub fn is_challenging(&self) -> bool {
        matches!(self, AspectKind::Square | AspectKind::Opposition)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectKind::Conjunction => "conjunction",
            AspectKind::Sextile => "sextile",
            AspectKind::Square => "square",
            AspectKind::Trine => "trine",
            AspectKind::Opposition => "opposition",
        }
    }
}

impl FromStr for AspectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        AspectKind::ALL
            .into_iter()
            .find(|a| a.as_str() == key)
            .ok_or_else(|| format!("unknown aspect `{s}`"))
    }
}

/// Where one body sits at the resolved moment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyPosition {
    pub sign: ZodiacSign,
    /// Degree within the sign, `[0, 30)`.
    pub degree: f64,
    pub retrograde: bool,
}

impl BodyPosition {
    pub fn from_longitude(longitude: f64, retrograde: bool) -> Self {
        let (sign, degree) = ZodiacSign::from_longitude(longitude);
        Self {
            sign,
            degree,
            retrograde,
        }
    }

    /// Absolute ecliptic longitude in `[0, 360)`.
    pub fn longitude(&self) -> f64 {
        self.sign.index() as f64 * 30.0 + self.degree
    }
}

/// One aspect between two bodies, with its distance from exact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectObservation {
    pub body1: Planet,
    pub body2: Planet,
    pub kind: AspectKind,
    pub orb: f64,
}

impl AspectObservation {
    pub fn involves(&self, body: Planet) -> bool {
        self.body1 == body || self.body2 == body
    }

    /// The other body of the pair, if `body` participates.
    pub fn partner(&self, body: Planet) -> Option<Planet> {
        if self.body1 == body {
            Some(self.body2)
        } else if self.body2 == body {
            Some(self.body1)
        } else {
            None
        }
    }

    /// `1.0` at an exact aspect, falling linearly to `0.0` at the maximum orb.
    pub fn tightness(&self) -> f64 {
        (1.0 - self.orb.abs() / self.kind.max_orb()).clamp(0.0, 1.0)
    }
}

/// Positions plus aspects, as delivered by any tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionsData {
    pub bodies: BTreeMap<Planet, BodyPosition>,
    #[serde(default)]
    pub aspects: Vec<AspectObservation>,
}

impl PositionsData {
    /// Build from bodies only, deriving aspects from their longitudes.
    pub fn with_detected_aspects(bodies: BTreeMap<Planet, BodyPosition>) -> Self {
        let aspects = detect_aspects(&bodies);
        Self { bodies, aspects }
    }

    pub fn body(&self, planet: Planet) -> Option<&BodyPosition> {
        self.bodies.get(&planet)
    }
}

/// Detect major aspects between every pair of bodies.
pub fn detect_aspects(bodies: &BTreeMap<Planet, BodyPosition>) -> Vec<AspectObservation> {
    let list: Vec<(Planet, f64)> = bodies.iter().map(|(p, b)| (*p, b.longitude())).collect();
    let mut out = Vec::new();
    for (i, (p1, l1)) in list.iter().enumerate() {
        for (p2, l2) in list.iter().skip(i + 1) {
            let separation = angular_separation(*l1, *l2);
            let closest = AspectKind::ALL
                .into_iter()
                .map(|k| (k, (separation - k.angle()).abs()))
                .filter(|(k, orb)| *orb <= k.max_orb())
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((kind, orb)) = closest {
                out.push(AspectObservation {
                    body1: *p1,
                    body2: *p2,
                    kind,
                    orb,
                });
            }
        }
    }
    out
}

/// Shortest arc between two longitudes, `[0, 180]`.
pub fn angular_separation(a: f64, b: f64) -> f64 {
    let d = normalize_degrees(a - b);
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

pub fn normalize_degrees(x: f64) -> f64 {
    let r = x.rem_euclid(360.0);
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

/// One tier of the astronomical fallback chain.
#[async_trait]
pub trait AstroSource: Send + Sync {
    /// Stable identifier reported in `ScoringResult` metadata.
    fn name(&self) -> &'static str;

    /// Confidence attached to positions from this tier.
    fn confidence(&self) -> f64;

    /// Remote tiers are skipped outright once the caller's deadline has passed.
    fn is_remote(&self) -> bool {
        false
    }

    async fn try_resolve(
        &self,
        at: DateTime<Utc>,
        location: Option<GeoLocation>,
    ) -> Result<PositionsData, SourceError>;
}
