//! # Alchemical state
//!
//! Derives elemental totals, ESMS, the thermodynamic scalars, Kalchm and
//! Monica from a set of body positions. Every division guards its
//! denominator: an indeterminate quantity is `NaN`, never a panic, and
//! downstream effects treat `NaN` as "no contribution".

use serde::Serialize;
use tracing::debug;

use crate::astro::PositionsData;
use crate::config::ScoringTables;
use crate::model::{Element, ElementalComposition};

/// Spirit / Essence / Matter / Substance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Esms {
    pub spirit: f64,
    pub essence: f64,
    pub matter: f64,
    pub substance: f64,
}

impl Esms {
    pub fn from_elements(elements: &ElementalComposition, tables: &ScoringTables) -> Self {
        let t = &tables.esms;
        let k = tables.esms_scale;
        Self {
            spirit: k * t.spirit.apply(elements),
            essence: k * t.essence.apply(elements),
            matter: k * t.matter.apply(elements),
            substance: k * t.substance.apply(elements),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thermodynamics {
    pub heat: f64,
    pub entropy: f64,
    pub reactivity: f64,
    pub net_energy: f64,
}

impl Thermodynamics {
    pub fn compute(esms: &Esms, e: &ElementalComposition) -> Self {
        let (s, es, m, sub) = (esms.spirit, esms.essence, esms.matter, esms.substance);
        let (fire, water, earth, air) = (e.fire(), e.water(), e.earth(), e.air());

        let heat = ratio(
            s.powi(2) + fire.powi(2),
            (sub + es + m + water + air + earth).powi(2),
        );
        let entropy = ratio(
            s.powi(2) + sub.powi(2) + fire.powi(2) + air.powi(2),
            (es + m + earth + water).powi(2),
        );
        let reactivity = ratio(
            s.powi(2) + sub.powi(2) + es.powi(2) + fire.powi(2) + air.powi(2) + water.powi(2),
            (m + earth).powi(2),
        );
        Self {
            heat,
            entropy,
            reactivity,
            net_energy: heat - entropy * reactivity,
        }
    }

    pub fn is_determinate(&self) -> bool {
        self.heat.is_finite()
            && self.entropy.is_finite()
            && self.reactivity.is_finite()
            && self.net_energy.is_finite()
    }
}

/// Snapshot of the derived alchemical quantities for one moment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlchemicalState {
    pub elements: ElementalComposition,
    pub esms: Esms,
    pub thermodynamics: Thermodynamics,
    pub kalchm: f64,
    pub monica: f64,
}

impl AlchemicalState {
    /// Build a state from already-known elements and ESMS.
    pub fn from_parts(elements: ElementalComposition, esms: Esms, kalchm_floor: f64) -> Self {
        let thermodynamics = Thermodynamics::compute(&esms, &elements);
        let k = kalchm(esms.spirit, esms.essence, esms.matter, esms.substance, kalchm_floor);
        let m = monica(thermodynamics.net_energy, thermodynamics.reactivity, k);
        Self {
            elements,
            esms,
            thermodynamics,
            kalchm: k,
            monica: m,
        }
    }

    /// Names of quantities that came out indeterminate.
    pub fn indeterminate_quantities(&self) -> Vec<&'static str> {
        let t = &self.thermodynamics;
        [
            ("heat", t.heat),
            ("entropy", t.entropy),
            ("reactivity", t.reactivity),
            ("net_energy", t.net_energy),
            ("kalchm", self.kalchm),
            ("monica", self.monica),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_finite())
        .map(|(n, _)| n)
        .collect()
    }
}

/// Derive the state for `positions`. Warnings describe degraded input.
pub fn derive(positions: &PositionsData, tables: &ScoringTables) -> (AlchemicalState, Vec<String>) {
    let mut warnings = Vec::new();
    let elements = if positions.bodies.is_empty() {
        warnings.push("no body positions available, elemental state is balanced".to_string());
        ElementalComposition::balanced()
    } else {
        elemental_totals(positions, tables)
    };
    let esms = Esms::from_elements(&elements, tables);
    let state = AlchemicalState::from_parts(elements, esms, tables.kalchm_floor);

    let missing = state.indeterminate_quantities();
    if !missing.is_empty() {
        debug!(target: "alchemy", ?missing, "indeterminate quantities in derived state");
        warnings.push(format!("indeterminate alchemical quantities: {}", missing.join(", ")));
    }
    (state, warnings)
}

/// Weighted element mass: sign element gets `sign_share`, intrinsic element the rest.
pub fn elemental_totals(positions: &PositionsData, tables: &ScoringTables) -> ElementalComposition {
    let mut totals = [0.0_f64; 4];
    let slot = |e: Element| Element::ALL.iter().position(|x| *x == e).unwrap_or(0);
    for (planet, pos) in &positions.bodies {
        let coeff = tables.planets.get(*planet);
        totals[slot(pos.sign.element())] += coeff.weight * tables.sign_share;
        totals[slot(coeff.element)] += coeff.weight * (1.0 - tables.sign_share);
    }
    ElementalComposition::normalized(totals[0], totals[1], totals[2], totals[3])
}

/// `(S^S · E^E) / (M^M · Sub^Sub)` with every base and exponent floored at `floor`.
pub fn kalchm(spirit: f64, essence: f64, matter: f64, substance: f64, floor: f64) -> f64 {
    let parts = [spirit, essence, matter, substance];
    if parts.iter().any(|v| !v.is_finite()) || !floor.is_finite() {
        return f64::NAN;
    }
    let p = |v: f64| {
        let v = v.max(floor);
        v.powf(v)
    };
    ratio(p(spirit) * p(essence), p(matter) * p(substance))
}

/// `-NetEnergy / (Reactivity · ln Kalchm)`; `NaN` when undefined.
pub fn monica(net_energy: f64, reactivity: f64, kalchm: f64) -> f64 {
    if !net_energy.is_finite() || !reactivity.is_finite() || !kalchm.is_finite() {
        return f64::NAN;
    }
    if reactivity == 0.0 || kalchm <= 0.0 {
        return f64::NAN;
    }
    let ln_k = kalchm.ln();
    if ln_k == 0.0 {
        return f64::NAN;
    }
    -net_energy / (reactivity * ln_k)
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 || !den.is_finite() || !num.is_finite() {
        f64::NAN
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::{BodyPosition, Planet};
    use crate::config::default_seed;
    use std::collections::BTreeMap;

    #[test]
    fn kalchm_of_unit_esms_is_one() {
        assert_eq!(kalchm(1.0, 1.0, 1.0, 1.0, 0.01), 1.0);
    }

    #[test]
    fn kalchm_floors_zero_bases() {
        let k = kalchm(0.0, 0.5, 0.0, 0.5, 0.01);
        assert!(k.is_finite());
        assert!((k - 1.0).abs() < 1e-12);
        assert!(kalchm(f64::NAN, 1.0, 1.0, 1.0, 0.01).is_nan());
    }

    #[test]
    fn monica_undefined_cases() {
        assert!(monica(1.0, 0.0, 2.0).is_nan());
        assert!(monica(1.0, 1.0, 1.0).is_nan());
        assert!(monica(1.0, 1.0, -3.0).is_nan());
        assert!(monica(f64::NAN, 1.0, 2.0).is_nan());
        let m = monica(-0.5, 2.0, std::f64::consts::E);
        assert!((m - 0.25).abs() < 1e-12);
    }

    #[test]
    fn zero_reactivity_state_has_nan_monica() {
        let elements = ElementalComposition::pure(Element::Earth);
        let esms = Esms {
            spirit: 0.0,
            essence: 0.0,
            matter: 1.0,
            substance: 0.0,
        };
        let s = AlchemicalState::from_parts(elements, esms, 0.01);
        assert_eq!(s.thermodynamics.reactivity, 0.0);
        assert!(s.monica.is_nan());
        assert!(s.indeterminate_quantities().contains(&"monica"));
    }

    #[test]
    fn zero_denominator_is_nan_not_panic() {
        let elements = ElementalComposition::pure(Element::Fire);
        let esms = Esms {
            spirit: 1.0,
            essence: 0.0,
            matter: 0.0,
            substance: 0.0,
        };
        let s = AlchemicalState::from_parts(elements, esms, 0.01);
        assert!(s.thermodynamics.heat.is_nan());
        assert!(s.thermodynamics.entropy.is_nan());
        assert!(!s.thermodynamics.is_determinate());
    }

    #[test]
    fn fire_signs_produce_fire_dominant_state() {
        let mut bodies = BTreeMap::new();
        bodies.insert(Planet::Sun, BodyPosition::from_longitude(125.0, false)); // Leo
        bodies.insert(Planet::Mars, BodyPosition::from_longitude(5.0, false)); // Aries
        bodies.insert(Planet::Jupiter, BodyPosition::from_longitude(245.0, false)); // Sagittarius
        bodies.insert(Planet::Saturn, BodyPosition::from_longitude(280.0, false)); // Capricorn
        let (state, _) = derive(&PositionsData::with_detected_aspects(bodies), &default_seed());
        assert_eq!(state.elements.dominant(), Element::Fire);
        assert!((state.elements.total() - 1.0).abs() < 1e-9);
        assert!(state.elements.fire() > 0.75);
        assert!(state.thermodynamics.is_determinate());
    }

    #[test]
    fn no_bodies_is_balanced_with_warning() {
        let (state, warnings) = derive(&PositionsData::default(), &default_seed());
        assert_eq!(state.elements, ElementalComposition::balanced());
        assert!(!warnings.is_empty());
    }

    #[test]
    fn esms_sum_to_scale() {
        let tables = default_seed();
        let (state, _) = derive(&crate::astro::StaticSource::positions(), &tables);
        let e = state.esms;
        assert!((e.spirit + e.essence + e.matter + e.substance - tables.esms_scale).abs() < 1e-9);
        assert!(state.kalchm.is_finite());
    }

    fn sky(longitudes: [(Planet, f64); 10]) -> PositionsData {
        PositionsData::with_detected_aspects(
            longitudes
                .into_iter()
                .map(|(p, lon)| (p, BodyPosition::from_longitude(lon, false)))
                .collect(),
        )
    }

    #[test]
    fn kalchm_leaves_neutral_band_for_lopsided_skies() {
        let tables = default_seed();
        let fiery = sky([
            (Planet::Sun, 125.0),
            (Planet::Moon, 5.0),
            (Planet::Mercury, 130.0),
            (Planet::Venus, 245.0),
            (Planet::Mars, 10.0),
            (Planet::Jupiter, 250.0),
            (Planet::Saturn, 280.0),
            (Planet::Uranus, 15.0),
            (Planet::Neptune, 135.0),
            (Planet::Pluto, 255.0),
        ]);
        let earthy = sky([
            (Planet::Sun, 40.0),
            (Planet::Moon, 130.0),
            (Planet::Mercury, 45.0),
            (Planet::Venus, 160.0),
            (Planet::Mars, 100.0),
            (Planet::Jupiter, 280.0),
            (Planet::Saturn, 290.0),
            (Planet::Uranus, 50.0),
            (Planet::Neptune, 170.0),
            (Planet::Pluto, 275.0),
        ]);
        let (hot, _) = derive(&fiery, &tables);
        let (dense, _) = derive(&earthy, &tables);
        assert!(hot.kalchm > 2.0, "fire-heavy kalchm {}", hot.kalchm);
        assert!(dense.kalchm < 0.5, "earth-heavy kalchm {}", dense.kalchm);
        assert!(hot.monica.is_finite() && dense.monica.is_finite());
    }
}
