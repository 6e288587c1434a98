//! Effects driven by the item's ruling bodies: transit, dignity, aspect,
//! retrograde and location.

use chrono::{DateTime, Timelike, Utc};

use super::{EffectContribution, EffectKind};
use crate::astro::{planetary_hour, AspectKind, Planet, ZodiacSign};
use crate::config::ScoringTables;
use crate::model::{Category, GeoLocation, ScoringContext};
use crate::snapshot::CelestialSnapshot;

/// Ruling bodies that actually have a position, and the coverage fraction.
fn present_rulers(snapshot: &CelestialSnapshot, ctx: &ScoringContext) -> (Vec<Planet>, f64) {
    let rulers = &ctx.item().ruling_bodies;
    let present: Vec<Planet> = rulers
        .iter()
        .copied()
        .filter(|p| snapshot.positions.body(*p).is_some())
        .collect();
    let coverage = if rulers.is_empty() {
        0.0
    } else {
        present.len() as f64 / rulers.len() as f64
    };
    (present, coverage)
}

fn join(bodies: &[Planet]) -> String {
    bodies.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", ")
}

/// Common early exits for ruler-based effects.
fn ruler_guard(
    effect: EffectKind,
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
) -> Result<(Vec<Planet>, f64), EffectContribution> {
    if ctx.item().ruling_bodies.is_empty() {
        return Err(EffectContribution::neutral(
            effect,
            snapshot.confidence,
            "no ruling bodies",
        ));
    }
    let (present, coverage) = present_rulers(snapshot, ctx);
    if present.is_empty() {
        return Err(EffectContribution::neutral(
            effect,
            0.0,
            "ruling bodies missing from resolved positions",
        ));
    }
    Ok((present, coverage))
}

fn transit_coefficient(kind: AspectKind) -> f64 {
    match kind {
        AspectKind::Trine => 0.15,
        AspectKind::Sextile => 0.10,
        AspectKind::Square => -0.15,
        AspectKind::Opposition => -0.12,
        AspectKind::Conjunction => 0.0,
    }
}

pub fn transit(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    tables: &ScoringTables,
) -> EffectContribution {
    let (rulers, coverage) = match ruler_guard(EffectKind::Transit, snapshot, ctx) {
        Ok(r) => r,
        Err(c) => return c,
    };

    let mut total = 0.0;
    let mut harmonious = 0;
    let mut challenging = 0;
    for ruler in &rulers {
        for a in snapshot.positions.aspects.iter() {
            let Some(partner) = a.partner(*ruler) else {
                continue;
            };
            let coeff = transit_coefficient(a.kind);
            if coeff == 0.0 {
                continue;
            }
            total += coeff * tables.planets.get(partner).weight;
            if a.kind.is_harmonious() {
                harmonious += 1;
            } else if a.kind.is_challenging() {
                challenging += 1;
            }
        }
    }

    EffectContribution::new(
        EffectKind::Transit,
        total,
        snapshot.confidence * coverage,
        format!(
            "{harmonious} harmonious / {challenging} challenging transits to {}",
            join(&rulers)
        ),
    )
}

/// Classical dignity of `planet` in `sign`, in Ptolemaic points.
pub fn dignity_points(planet: Planet, sign: ZodiacSign) -> (i32, &'static str) {
    use ZodiacSign::*;
    type Signs = &'static [ZodiacSign];
    let (domicile, exaltation, detriment, fall): (Signs, Signs, Signs, Signs) =
        match planet {
            Planet::Sun => (&[Leo], &[Aries], &[Aquarius], &[Libra]),
            Planet::Moon => (&[Cancer], &[Taurus], &[Capricorn], &[Scorpio]),
            Planet::Mercury => (&[Gemini, Virgo], &[Virgo], &[Sagittarius, Pisces], &[Pisces]),
            Planet::Venus => (&[Taurus, Libra], &[Pisces], &[Aries, Scorpio], &[Virgo]),
            Planet::Mars => (&[Aries, Scorpio], &[Capricorn], &[Taurus, Libra], &[Cancer]),
            Planet::Jupiter => (&[Sagittarius, Pisces], &[Cancer], &[Gemini, Virgo], &[Capricorn]),
            Planet::Saturn => (&[Capricorn, Aquarius], &[Libra], &[Cancer, Leo], &[Aries]),
            Planet::Uranus => (&[Aquarius], &[Scorpio], &[Leo], &[Taurus]),
            Planet::Neptune => (&[Pisces], &[Cancer], &[Virgo], &[Capricorn]),
            Planet::Pluto => (&[Scorpio], &[Aries], &[Taurus], &[Libra]),
        };
    if domicile.contains(&sign) {
        (5, "domicile")
    } else if exaltation.contains(&sign) {
        (4, "exaltation")
    } else if detriment.contains(&sign) {
        (-5, "detriment")
    } else if fall.contains(&sign) {
        (-4, "fall")
    } else {
        (0, "peregrine")
    }
}

pub fn dignity(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    _tables: &ScoringTables,
) -> EffectContribution {
    let (rulers, coverage) = match ruler_guard(EffectKind::Dignity, snapshot, ctx) {
        Ok(r) => r,
        Err(c) => return c,
    };

    let mut points = 0.0;
    let mut parts = Vec::with_capacity(rulers.len());
    for p in &rulers {
        let Some(pos) = snapshot.positions.body(*p) else {
            continue;
        };
        let (pts, label) = dignity_points(*p, pos.sign);
        points += pts as f64;
        parts.push(format!("{p} in {} ({label})", pos.sign.as_str()));
    }
    let avg = points / rulers.len() as f64;
    EffectContribution::new(
        EffectKind::Dignity,
        avg * 0.3 / 5.0,
        snapshot.confidence * coverage,
        parts.join("; "),
    )
}

fn aspect_polarity(kind: AspectKind) -> f64 {
    match kind {
        AspectKind::Trine => 1.0,
        AspectKind::Sextile => 0.6,
        AspectKind::Conjunction => 0.3,
        AspectKind::Square => -1.0,
        AspectKind::Opposition => -0.8,
    }
}

pub fn aspect(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    _tables: &ScoringTables,
) -> EffectContribution {
    let (rulers, coverage) = match ruler_guard(EffectKind::Aspect, snapshot, ctx) {
        Ok(r) => r,
        Err(c) => return c,
    };

    let touching: Vec<_> = snapshot
        .positions
        .aspects
        .iter()
        .filter(|a| rulers.iter().any(|r| a.involves(*r)))
        .collect();
    let total: f64 = touching
        .iter()
        .map(|a| 0.1 * aspect_polarity(a.kind) * a.tightness())
        .sum();
    let tightest = touching
        .iter()
        .max_by(|a, b| a.tightness().total_cmp(&b.tightness()))
        .map(|a| {
            format!(
                ", tightest {} {} {} (orb {:.1}°)",
                a.body1,
                a.kind.as_str(),
                a.body2,
                a.orb
            )
        })
        .unwrap_or_default();

    EffectContribution::new(
        EffectKind::Aspect,
        total,
        snapshot.confidence * coverage,
        format!("{} aspects touch ruling bodies{tightest}", touching.len()),
    )
}

pub fn retrograde(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    _tables: &ScoringTables,
) -> EffectContribution {
    let (rulers, coverage) = match ruler_guard(EffectKind::Retrograde, snapshot, ctx) {
        Ok(r) => r,
        Err(c) => return c,
    };

    let retro: Vec<Planet> = rulers
        .iter()
        .copied()
        .filter(|p| snapshot.positions.body(*p).is_some_and(|b| b.retrograde))
        .collect();
    let recipe = ctx.item().category == Category::Recipe;
    let penalized: Vec<Planet> = retro
        .iter()
        .copied()
        .filter(|p| !(recipe && *p == Planet::Mercury))
        .collect();

    let note = if retro.is_empty() {
        "no ruling body retrograde".to_string()
    } else if penalized.len() < retro.len() {
        format!(
            "retrograde: {}; mercury retrograde suits revisiting familiar recipes",
            join(&retro)
        )
    } else {
        format!("retrograde: {}", join(&retro))
    };
    EffectContribution::new(
        EffectKind::Retrograde,
        -0.1 * penalized.len() as f64,
        snapshot.confidence * coverage,
        note,
    )
}

/// `cos` of the Sun's local hour angle: 1 at local solar noon, -1 at midnight.
pub fn solar_day_factor(at: DateTime<Utc>, location: GeoLocation) -> f64 {
    let utc_hours = at.hour() as f64 + at.minute() as f64 / 60.0 + at.second() as f64 / 3600.0;
    let local_solar = utc_hours + location.longitude / 15.0;
    ((local_solar - 12.0) * 15.0).to_radians().cos()
}

pub fn location(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    tables: &ScoringTables,
) -> EffectContribution {
    let Some(loc) = ctx.location() else {
        return EffectContribution::neutral(
            EffectKind::Location,
            snapshot.confidence,
            "no location",
        );
    };
    if ctx.item().ruling_bodies.is_empty() {
        return EffectContribution::neutral(
            EffectKind::Location,
            snapshot.confidence,
            "no ruling bodies",
        );
    }

    // -1 on the equator, +1 at the poles.
    let latitude_factor = 2.0 * loc.latitude.abs() / 90.0 - 1.0;
    let day = solar_day_factor(ctx.timestamp(), loc);
    // None where the Sun neither rises nor sets.
    let hour = planetary_hour(ctx.timestamp(), loc);

    let rulers = &ctx.item().ruling_bodies;
    let total: f64 = rulers
        .iter()
        .map(|p| {
            let lat_term = tables.planets.get(*p).latitude_affinity * latitude_factor;
            let diurnal = match p {
                Planet::Sun => day,
                Planet::Moon => -day,
                _ => 0.0,
            };
            let hour_term = match hour {
                Some(h) if h.ruler == *p => 1.0,
                Some(h) if h.day_ruler == *p => 0.5,
                _ => 0.0,
            };
            0.4 * lat_term + 0.3 * diurnal + 0.3 * hour_term
        })
        .sum();
    let avg = total / rulers.len() as f64;

    let hour_note = match hour {
        Some(h) => format!("hour of {} (day of {})", h.ruler, h.day_ruler),
        None => "no planetary hour".to_string(),
    };
    EffectContribution::new(
        EffectKind::Location,
        0.2 * avg,
        snapshot.confidence,
        format!(
            "latitude {:.1}°, solar day factor {:.2}, {hour_note}",
            loc.latitude, day
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::{AspectObservation, BodyPosition, PositionsData};
    use crate::effects::test_support::*;
    use std::collections::BTreeMap;

    const NOON: &str = "2024-06-01T12:00:00Z";

    fn positions(list: &[(Planet, f64, bool)]) -> PositionsData {
        let bodies: BTreeMap<Planet, BodyPosition> = list
            .iter()
            .map(|(p, lon, r)| (*p, BodyPosition::from_longitude(*lon, *r)))
            .collect();
        PositionsData::with_detected_aspects(bodies)
    }

    #[test]
    fn no_rulers_yields_neutral_zero() {
        let snap = snapshot_from(positions(&[(Planet::Sun, 10.0, false)]), 0.95);
        let ctx = ctx_for(item(Category::Recipe), "2024-06-01T12:00:00Z");
        let t = tables();
        for c in [
            transit(&snap, &ctx, &t),
            dignity(&snap, &ctx, &t),
            aspect(&snap, &ctx, &t),
            retrograde(&snap, &ctx, &t),
            location(&snap, &ctx, &t),
        ] {
            assert_eq!(c.value, 0.0);
            assert_eq!(c.confidence, 0.95);
            assert!(!c.indeterminate);
        }
    }

    #[test]
    fn trine_adds_and_square_subtracts() {
        let t = tables();
        // Venus trine Jupiter.
        let trine = snapshot_from(
            positions(&[(Planet::Venus, 10.0, false), (Planet::Jupiter, 130.0, false)]),
            0.7,
        );
        // Venus square Saturn.
        let square = snapshot_from(
            positions(&[(Planet::Venus, 10.0, false), (Planet::Saturn, 100.0, false)]),
            0.7,
        );
        let ctx = ctx_for(item(Category::Ingredient).ruled_by([Planet::Venus]), NOON);
        let up = transit(&trine, &ctx, &t);
        let down = transit(&square, &ctx, &t);
        assert!((up.value - 0.15 * 0.5).abs() < 1e-12);
        assert!((down.value + 0.15 * 0.5).abs() < 1e-12);
        assert!(aspect(&trine, &ctx, &t).value > 0.0);
        assert!(aspect(&square, &ctx, &t).value < 0.0);
    }

    #[test]
    fn aspect_weight_falls_with_orb() {
        let t = tables();
        let ctx = ctx_for(item(Category::Ingredient).ruled_by([Planet::Mars]), NOON);
        let mut exact = snapshot_from(positions(&[(Planet::Mars, 0.0, false)]), 0.7);
        exact.positions.aspects = vec![AspectObservation {
            body1: Planet::Mars,
            body2: Planet::Sun,
            kind: AspectKind::Trine,
            orb: 0.0,
        }];
        let mut loose = exact.clone();
        loose.positions.aspects[0].orb = 6.0;
        assert!((aspect(&exact, &ctx, &t).value - 0.1).abs() < 1e-12);
        assert!((aspect(&loose, &ctx, &t).value - 0.025).abs() < 1e-12);
    }

    #[test]
    fn dignity_table() {
        assert_eq!(dignity_points(Planet::Sun, ZodiacSign::Leo).0, 5);
        assert_eq!(dignity_points(Planet::Moon, ZodiacSign::Taurus).0, 4);
        assert_eq!(dignity_points(Planet::Mars, ZodiacSign::Libra).0, -5);
        assert_eq!(dignity_points(Planet::Saturn, ZodiacSign::Aries).0, -4);
        assert_eq!(dignity_points(Planet::Venus, ZodiacSign::Gemini).0, 0);

        let snap = snapshot_from(
            positions(&[(Planet::Sun, 125.0, false), (Planet::Mars, 190.0, false)]),
            0.7,
        );
        let ctx = ctx_for(item(Category::Method).ruled_by([Planet::Sun]), NOON);
        assert!((dignity(&snap, &ctx, &tables()).value - 0.3).abs() < 1e-12);
        let both = ctx_for(item(Category::Method).ruled_by([Planet::Sun, Planet::Mars]), NOON);
        assert!(dignity(&snap, &both, &tables()).value.abs() < 1e-12);
    }

    #[test]
    fn mercury_retrograde_is_neutral_for_recipes() {
        let snap = snapshot_from(
            positions(&[(Planet::Mercury, 40.0, true), (Planet::Saturn, 300.0, true)]),
            0.7,
        );
        let t = tables();
        let recipe = ctx_for(item(Category::Recipe).ruled_by([Planet::Mercury]), NOON);
        let c = retrograde(&snap, &recipe, &t);
        assert_eq!(c.value, 0.0);
        assert!(c.note.contains("familiar recipes"));

        let method = ctx_for(
            item(Category::Method).ruled_by([Planet::Mercury, Planet::Saturn]),
            "2024-06-01T12:00:00Z",
        );
        assert!((retrograde(&snap, &method, &t).value + 0.2).abs() < 1e-12);
    }

    #[test]
    fn missing_ruler_positions_lower_confidence() {
        let snap = snapshot_from(positions(&[(Planet::Sun, 10.0, false)]), 0.7);
        let ctx = ctx_for(item(Category::Cuisine).ruled_by([Planet::Sun, Planet::Pluto]), NOON);
        let c = transit(&snap, &ctx, &tables());
        assert!((c.confidence - 0.35).abs() < 1e-12);
    }

    #[test]
    fn sun_ruled_items_favour_local_noon() {
        let snap = snapshot_from(positions(&[(Planet::Sun, 10.0, false)]), 0.7);
        let t = tables();
        let at = |ts: &str| {
            ScoringContext::builder(item(Category::Recipe).ruled_by([Planet::Sun]))
                .at_iso(ts)
                .unwrap()
                .location(GeoLocation::new(0.0, 0.0).unwrap())
                .build()
                .unwrap()
        };
        let noon = location(&snap, &at("2024-06-01T12:00:00Z"), &t);
        let midnight = location(&snap, &at("2024-06-01T00:00:00Z"), &t);
        assert!(noon.value > midnight.value);
        let factor = solar_day_factor(
            "2024-06-01T12:00:00Z".parse().unwrap(),
            GeoLocation::new(0.0, 0.0).unwrap(),
        );
        assert!((factor - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ruler_of_the_planetary_hour_is_boosted() {
        // Wednesday 2024-03-20 06:15 UTC in London: first hour, ruled by Mercury.
        let snap = snapshot_from(positions(&[(Planet::Sun, 0.0, false)]), 0.7);
        let t = tables();
        let ctx_for_ruler = |p: Planet| {
            ScoringContext::builder(item(Category::Method).ruled_by([p]))
                .at_iso("2024-03-20T06:15:00Z")
                .unwrap()
                .location(GeoLocation::new(51.48, 0.0).unwrap())
                .build()
                .unwrap()
        };
        let mercury = location(&snap, &ctx_for_ruler(Planet::Mercury), &t);
        let saturn = location(&snap, &ctx_for_ruler(Planet::Saturn), &t);
        assert!(mercury.note.contains("hour of mercury"), "{}", mercury.note);

        let lat = 2.0 * 51.48 / 90.0 - 1.0;
        let base = |p: Planet| 0.2 * 0.4 * t.planets.get(p).latitude_affinity * lat;
        assert!((mercury.value - (base(Planet::Mercury) + 0.2 * 0.3)).abs() < 1e-9);
        assert!((saturn.value - base(Planet::Saturn)).abs() < 1e-9);
    }

    #[test]
    fn polar_night_still_scores_location() {
        let snap = snapshot_from(positions(&[(Planet::Sun, 270.0, false)]), 0.7);
        let ctx = ScoringContext::builder(item(Category::Recipe).ruled_by([Planet::Mars]))
            .at_iso("2024-12-21T12:00:00Z")
            .unwrap()
            .location(GeoLocation::new(78.2, 15.6).unwrap())
            .build()
            .unwrap();
        let c = location(&snap, &ctx, &tables());
        assert!(c.note.contains("no planetary hour"));
        assert!(!c.indeterminate);
        assert!((-0.2..=0.2).contains(&c.value));
    }
}
