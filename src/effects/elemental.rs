//! Elemental Compatibility.
//!
//! Shared mass `Σ min(item_e, target_e)` lifts compatibility from the
//! positive floor up to 1. The target is the current elemental balance,
//! pulled toward the user's preferred elements when given. No pairing is
//! ever penalized.

use super::{EffectContribution, EffectKind};
use crate::config::ScoringTables;
use crate::model::{Element, ElementalComposition, ScoringContext};
use crate::snapshot::CelestialSnapshot;

const SCALE: f64 = 0.4;

/// Shared elemental mass in `[0, 1]`; 1 only for identical compositions.
pub fn overlap(a: &ElementalComposition, b: &ElementalComposition) -> f64 {
    Element::ALL
        .iter()
        .map(|e| a.get(*e).min(b.get(*e)))
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

/// Compatibility in `[floor, 1]`.
pub fn compatibility(a: &ElementalComposition, b: &ElementalComposition, floor: f64) -> f64 {
    floor + (1.0 - floor) * overlap(a, b)
}

pub fn elemental_compatibility(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    tables: &ScoringTables,
) -> EffectContribution {
    let mut target = snapshot.state.elements;
    let mut blended = false;
    if let Some(pref) = ctx.preferences().and_then(|p| p.elemental_target()) {
        target = target.blend(&pref, tables.preference_blend);
        blended = true;
    }

    let item = &ctx.item().elements;
    let compat = compatibility(item, &target, tables.elemental_floor);
    let note = format!(
        "{} item vs {}-dominant {}: compatibility {:.2}",
        item.dominant(),
        target.dominant(),
        if blended { "target (with preferences)" } else { "sky" },
        compat
    );
    EffectContribution::new(
        EffectKind::ElementalCompatibility,
        SCALE * compat,
        snapshot.confidence,
        note,
    )
}
