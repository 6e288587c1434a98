//! Deterministic offline ephemeris.
//!
//! Low-precision Keplerian model using J2000 mean orbital elements and their
//! per-century rates (valid roughly 1800–2050, accuracy of a degree or so for
//! the outer planets), plus a two-term mean-element Moon. Retrograde motion
//! is detected by comparing geocentric longitudes one day apart.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};

use super::{normalize_degrees, AstroSource, BodyPosition, Planet, PositionsData};
use crate::error::SourceError;
use crate::model::GeoLocation;

pub const EPHEMERIS_SOURCE_NAME: &str = "deterministic-ephemeris";
pub const EPHEMERIS_CONFIDENCE: f64 = 0.7;

const VALID_YEARS: std::ops::RangeInclusive<i32> = 1800..=2050;
const J2000: f64 = 2_451_545.0;

/// `[a, e, I, L, long.peri, long.node]` at J2000 and their rates per Julian century.
struct OrbitalElements {
    base: [f64; 6],
    rate: [f64; 6],
}

#[rustfmt::skip]
const MERCURY: OrbitalElements = OrbitalElements {
    base: [0.387_099_27, 0.205_635_93, 7.004_979_02, 252.250_323_50, 77.457_796_28, 48.330_765_93],
    rate: [0.000_000_37, 0.000_019_06, -0.005_947_49, 149_472.674_111_75, 0.160_476_89, -0.125_340_81],
};
#[rustfmt::skip]
const VENUS: OrbitalElements = OrbitalElements {
    base: [0.723_335_66, 0.006_776_72, 3.394_676_05, 181.979_099_50, 131.602_467_18, 76.679_842_55],
    rate: [0.000_003_90, -0.000_041_07, -0.000_788_90, 58_517.815_387_29, 0.002_683_29, -0.277_694_18],
};
const EARTH_MOON_BARY: OrbitalElements = OrbitalElements {
    base: [1.000_002_61, 0.016_711_23, -0.000_015_31, 100.464_571_66, 102.937_681_93, 0.0],
    rate: [0.000_005_62, -0.000_043_92, -0.012_946_68, 35_999.372_449_81, 0.323_273_64, 0.0],
};
#[rustfmt::skip]
const MARS: OrbitalElements = OrbitalElements {
    base: [1.523_710_34, 0.093_394_10, 1.849_691_42, -4.553_432_05, -23.943_629_59, 49.559_538_91],
    rate: [0.000_018_47, 0.000_078_82, -0.008_131_31, 19_140.302_684_99, 0.444_410_88, -0.292_573_43],
};
#[rustfmt::skip]
const JUPITER: OrbitalElements = OrbitalElements {
    base: [5.202_887_00, 0.048_386_24, 1.304_396_95, 34.396_440_51, 14.728_479_83, 100.473_909_09],
    rate: [-0.000_116_07, -0.000_132_53, -0.001_837_14, 3_034.746_127_75, 0.212_526_68, 0.204_691_06],
};
#[rustfmt::skip]
const SATURN: OrbitalElements = OrbitalElements {
    base: [9.536_675_94, 0.053_861_79, 2.485_991_87, 49.954_244_23, 92.598_878_31, 113.662_424_48],
    rate: [-0.001_250_60, -0.000_509_91, 0.001_936_09, 1_222.493_622_01, -0.418_972_16, -0.288_677_94],
};
#[rustfmt::skip]
const URANUS: OrbitalElements = OrbitalElements {
    base: [19.189_164_64, 0.047_257_44, 0.772_637_83, 313.238_104_51, 170.954_276_30, 74.016_925_03],
    rate: [-0.001_961_76, -0.000_043_97, -0.002_429_39, 428.482_027_85, 0.408_052_81, 0.042_405_89],
};
#[rustfmt::skip]
const NEPTUNE: OrbitalElements = OrbitalElements {
    base: [30.069_922_76, 0.008_590_48, 1.770_043_47, -55.120_029_69, 44.964_762_27, 131.784_225_74],
    rate: [0.000_262_91, 0.000_051_05, 0.000_353_72, 218.459_453_25, -0.322_414_64, -0.005_086_64],
};
#[rustfmt::skip]
const PLUTO: OrbitalElements = OrbitalElements {
    base: [39.482_116_75, 0.248_827_30, 17.140_012_06, 238.929_038_33, 224.068_916_29, 110.303_936_84],
    rate: [-0.000_315_96, 0.000_051_70, 0.000_048_18, 145.207_805_15, -0.040_629_42, -0.011_834_82],
};

fn elements_for(planet: Planet) -> Option<&'static OrbitalElements> {
    match planet {
        Planet::Mercury => Some(&MERCURY),
        Planet::Venus => Some(&VENUS),
        Planet::Mars => Some(&MARS),
        Planet::Jupiter => Some(&JUPITER),
        Planet::Saturn => Some(&SATURN),
        Planet::Uranus => Some(&URANUS),
        Planet::Neptune => Some(&NEPTUNE),
        Planet::Pluto => Some(&PLUTO),
        Planet::Sun | Planet::Moon => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EphemerisSource;

impl EphemerisSource {
    /// Compute positions for `at`, or fail (retryably) outside the model's window.
    pub fn compute(at: DateTime<Utc>) -> Result<PositionsData, SourceError> {
        if !VALID_YEARS.contains(&at.year()) {
            return Err(SourceError::Unavailable(format!(
                "ephemeris model covers {}..={}, requested {}",
                VALID_YEARS.start(),
                VALID_YEARS.end(),
                at.year()
            )));
        }
        let jd = julian_day(at);
        let mut bodies = BTreeMap::new();
        for planet in Planet::ALL {
            let now = geocentric_longitude(planet, jd);
            let retrograde = if planet.can_retrograde() {
                let next = geocentric_longitude(planet, jd + 1.0);
                signed_delta(now, next) < 0.0
            } else {
                false
            };
            bodies.insert(planet, BodyPosition::from_longitude(now, retrograde));
        }
        Ok(PositionsData::with_detected_aspects(bodies))
    }
}

#[async_trait]
impl AstroSource for EphemerisSource {
    fn name(&self) -> &'static str {
        EPHEMERIS_SOURCE_NAME
    }

    fn confidence(&self) -> f64 {
        EPHEMERIS_CONFIDENCE
    }

    async fn try_resolve(
        &self,
        at: DateTime<Utc>,
        _location: Option<GeoLocation>,
    ) -> Result<PositionsData, SourceError> {
        Self::compute(at)
    }
}

pub fn julian_day(at: DateTime<Utc>) -> f64 {
    // Unix epoch is JD 2440587.5.
    at.timestamp_millis() as f64 / 86_400_000.0 + 2_440_587.5
}

/// Geocentric ecliptic longitude in degrees, `[0, 360)`.
fn geocentric_longitude(planet: Planet, jd: f64) -> f64 {
    match planet {
        Planet::Moon => moon_longitude(jd),
        Planet::Sun => {
            let (x, y, _) = heliocentric(&EARTH_MOON_BARY, jd);
            normalize_degrees(y.atan2(x).to_degrees() + 180.0)
        }
        other => {
            let Some(el) = elements_for(other) else {
                return 0.0;
            };
            let (px, py, _) = heliocentric(el, jd);
            let (ex, ey, _) = heliocentric(&EARTH_MOON_BARY, jd);
            normalize_degrees((py - ey).atan2(px - ex).to_degrees())
        }
    }
}

/// Heliocentric ecliptic rectangular coordinates (AU).
fn heliocentric(el: &OrbitalElements, jd: f64) -> (f64, f64, f64) {
    let t = (jd - J2000) / 36_525.0;
    let v = |i: usize| el.base[i] + el.rate[i] * t;
    let (a, e, incl, l, peri, node) = (v(0), v(1), v(2), v(3), v(4), v(5));

    let omega = (peri - node).to_radians();
    let mean_anomaly = wrap_pm180(l - peri).to_radians();
    let ecc_anomaly = solve_kepler(mean_anomaly, e);

    let xp = a * (ecc_anomaly.cos() - e);
    let yp = a * (1.0 - e * e).sqrt() * ecc_anomaly.sin();

    let (so, co) = omega.sin_cos();
    let (sn, cn) = node.to_radians().sin_cos();
    let (si, ci) = incl.to_radians().sin_cos();

    let x = (co * cn - so * sn * ci) * xp + (-so * cn - co * sn * ci) * yp;
    let y = (co * sn + so * cn * ci) * xp + (-so * sn + co * cn * ci) * yp;
    let z = (so * si) * xp + (co * si) * yp;
    (x, y, z)
}

fn solve_kepler(mean_anomaly: f64, e: f64) -> f64 {
    let mut ea = mean_anomaly + e * mean_anomaly.sin();
    for _ in 0..8 {
        let delta = (ea - e * ea.sin() - mean_anomaly) / (1.0 - e * ea.cos());
        ea -= delta;
        if delta.abs() < 1e-10 {
            break;
        }
    }
    ea
}

/// Mean-element lunar longitude with the equation of centre and evection.
fn moon_longitude(jd: f64) -> f64 {
    let d = jd - J2000;
    let mean_longitude = 218.316 + 13.176_396 * d;
    let mean_anomaly = (134.963 + 13.064_993 * d).to_radians();
    let elongation = (297.850 + 12.190_749 * d).to_radians();
    normalize_degrees(
        mean_longitude
            + 6.289 * mean_anomaly.sin()
            + 1.274 * (2.0 * elongation - mean_anomaly).sin(),
    )
}

fn wrap_pm180(x: f64) -> f64 {
    let r = normalize_degrees(x);
    if r > 180.0 {
        r - 360.0
    } else {
        r
    }
}

/// Signed shortest motion from `from` to `to`, `(-180, 180]`.
fn signed_delta(from: f64, to: f64) -> f64 {
    wrap_pm180(to - from)
}
