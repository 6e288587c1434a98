//! Effects read from the derived alchemical state.

use super::{EffectContribution, EffectKind};
use crate::config::ScoringTables;
use crate::model::{Category, ScoringContext};
use crate::snapshot::CelestialSnapshot;

fn active(net_energy: f64) -> f64 {
    if net_energy >= 0.0 {
        0.2 * net_energy.tanh()
    } else {
        0.1 * net_energy.tanh()
    }
}

fn complex(entropy: f64) -> f64 {
    0.3 * entropy.max(0.0).tanh() - 0.1
}

/// Net energy favours active categories, entropy favours complex ones.
pub fn thermodynamic(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    _tables: &ScoringTables,
) -> EffectContribution {
    let t = &snapshot.state.thermodynamics;
    let category = ctx.item().category;
    let needed: &[(&str, f64)] = match category {
        Category::Method => &[("net energy", t.net_energy)],
        Category::Recipe | Category::Cuisine => &[("entropy", t.entropy)],
        Category::Ingredient => &[("net energy", t.net_energy), ("entropy", t.entropy)],
    };
    if let Some((name, _)) = needed.iter().find(|(_, v)| !v.is_finite()) {
        return EffectContribution::indeterminate(
            EffectKind::Thermodynamic,
            format!("{name} is indeterminate"),
        );
    }

    let value = match category {
        Category::Method => active(t.net_energy),
        Category::Recipe | Category::Cuisine => complex(t.entropy),
        Category::Ingredient => 0.5 * (active(t.net_energy) + complex(t.entropy)),
    };
    EffectContribution::new(
        EffectKind::Thermodynamic,
        value,
        snapshot.confidence,
        format!(
            "heat {:.2}, entropy {:.2}, net energy {:.2}",
            t.heat, t.entropy, t.net_energy
        ),
    )
}

pub fn kalchm_resonance(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    _tables: &ScoringTables,
) -> EffectContribution {
    let k = snapshot.state.kalchm;
    if !k.is_finite() || k <= 0.0 {
        return EffectContribution::indeterminate(
            EffectKind::KalchmResonance,
            "kalchm is indeterminate",
        );
    }
    let strength = match ctx.item().category {
        Category::Method | Category::Recipe => 1.0,
        Category::Ingredient | Category::Cuisine => 0.5,
    };
    let (value, verdict) = if k > 2.0 {
        (0.1 * strength * (k / 2.0).ln().tanh(), "transformative")
    } else if k < 0.5 {
        (-0.05 * (0.5 / k).ln().tanh(), "stagnant")
    } else {
        (0.0, "balanced")
    };
    EffectContribution::new(
        EffectKind::KalchmResonance,
        value,
        snapshot.confidence,
        format!("kalchm {k:.3} ({verdict})"),
    )
}

pub fn monica_optimization(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    _tables: &ScoringTables,
) -> EffectContribution {
    let m = snapshot.state.monica;
    if !m.is_finite() {
        return EffectContribution::indeterminate(
            EffectKind::MonicaOptimization,
            "monica constant is indeterminate",
        );
    }
    let strength = match ctx.item().category {
        Category::Method | Category::Ingredient => 1.0,
        Category::Recipe | Category::Cuisine => 0.5,
    };
    let value = if m >= 0.0 {
        0.08 * strength * m.tanh()
    } else {
        -0.03 * strength * m.abs().tanh()
    };
    EffectContribution::new(
        EffectKind::MonicaOptimization,
        value,
        snapshot.confidence,
        format!("monica {m:.3}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alchemy::{AlchemicalState, Esms};
    use crate::astro::StaticSource;
    use crate::effects::test_support::*;
    use crate::model::{Element, ElementalComposition};

    const NOON: &str = "2024-06-01T12:00:00Z";

    fn with_state(state: AlchemicalState) -> CelestialSnapshot {
        let mut snap = snapshot_from(StaticSource::positions(), 0.7);
        snap.state = state;
        snap
    }

    #[test]
    fn zero_reactivity_makes_monica_indeterminate() {
        let state = AlchemicalState::from_parts(
            ElementalComposition::pure(Element::Earth),
            Esms {
                spirit: 0.0,
                essence: 0.0,
                matter: 1.0,
                substance: 0.0,
            },
            0.01,
        );
        let snap = with_state(state);
        let ctx = ctx_for(item(Category::Method), NOON);
        let c = monica_optimization(&snap, &ctx, &tables());
        assert!(c.indeterminate);
        assert_eq!(c.value, 0.0);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn kalchm_thresholds() {
        let mut snap = snapshot_from(StaticSource::positions(), 0.7);
        let method = ctx_for(item(Category::Method), NOON);
        let cuisine = ctx_for(item(Category::Cuisine), NOON);
        let t = tables();

        snap.state.kalchm = 8.0;
        let full = kalchm_resonance(&snap, &method, &t).value;
        let half = kalchm_resonance(&snap, &cuisine, &t).value;
        assert!(full > 0.0 && full <= 0.1);
        assert!((half - full / 2.0).abs() < 1e-12);

        snap.state.kalchm = 1.0;
        assert_eq!(kalchm_resonance(&snap, &method, &t).value, 0.0);

        snap.state.kalchm = 0.1;
        let low = kalchm_resonance(&snap, &method, &t).value;
        assert!(low < 0.0 && low >= -0.05);

        snap.state.kalchm = f64::NAN;
        assert!(kalchm_resonance(&snap, &method, &t).indeterminate);
    }

    #[test]
    fn resonance_from_resolved_positions() {
        use crate::astro::{BodyPosition, Planet, PositionsData};

        let fiery: [(Planet, f64); 10] = [
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
        ];
        let positions = PositionsData::with_detected_aspects(
            fiery
                .into_iter()
                .map(|(p, lon)| (p, BodyPosition::from_longitude(lon, false)))
                .collect(),
        );
        let snap = snapshot_from(positions, 0.7);
        let ctx = ctx_for(item(Category::Method), NOON);
        let c = kalchm_resonance(&snap, &ctx, &tables());
        assert!(!c.indeterminate);
        assert!(c.value > 0.0 && c.value <= 0.1, "resonance {} ({})", c.value, c.note);
        assert!(c.note.contains("transformative"));
    }

    #[test]
    fn thermodynamic_by_category() {
        let mut snap = snapshot_from(StaticSource::positions(), 0.7);
        snap.state.thermodynamics.net_energy = 2.0;
        snap.state.thermodynamics.entropy = 0.0;
        let t = tables();
        let method = thermodynamic(&snap, &ctx_for(item(Category::Method), NOON), &t);
        let recipe = thermodynamic(&snap, &ctx_for(item(Category::Recipe), NOON), &t);
        assert!(method.value > 0.19);
        assert!((recipe.value + 0.1).abs() < 1e-12);

        snap.state.thermodynamics.entropy = f64::NAN;
        let ing = thermodynamic(&snap, &ctx_for(item(Category::Ingredient), NOON), &t);
        assert!(ing.indeterminate);
        assert!(ing.note.contains("entropy"));
    }

    #[test]
    fn monica_favours_efficiency_categories() {
        let mut snap = snapshot_from(StaticSource::positions(), 0.7);
        snap.state.monica = 3.0;
        let t = tables();
        let method = monica_optimization(&snap, &ctx_for(item(Category::Method), NOON), &t);
        let recipe = monica_optimization(&snap, &ctx_for(item(Category::Recipe), NOON), &t);
        assert!(method.value > recipe.value);
        assert!(method.value <= 0.08);
        snap.state.monica = -3.0;
        let neg = monica_optimization(&snap, &ctx_for(item(Category::Method), NOON), &t);
        assert!(neg.value < 0.0 && neg.value >= -0.03);
    }
}
