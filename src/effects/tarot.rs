//! Tarot placeholder: static affinity by category, at half the source confidence.

use super::{EffectContribution, EffectKind};
use crate::config::ScoringTables;
use crate::model::ScoringContext;
use crate::snapshot::CelestialSnapshot;

pub fn tarot(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    tables: &ScoringTables,
) -> EffectContribution {
    let category = ctx.item().category;
    EffectContribution::new(
        EffectKind::Tarot,
        tables.tarot.get(category),
        0.5 * snapshot.confidence,
        format!("static {category} affinity"),
    )
}
