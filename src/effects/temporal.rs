//! Calendar-driven effects: season and lunar phase.

use super::{EffectContribution, EffectKind};
use crate::astro::lunar_info;
use crate::config::ScoringTables;
use crate::model::{ScoringContext, Season};
use crate::snapshot::CelestialSnapshot;

pub fn seasonal(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    _tables: &ScoringTables,
) -> EffectContribution {
    let tags = &ctx.item().seasons;
    if tags.is_empty() {
        return EffectContribution::neutral(
            EffectKind::Seasonal,
            snapshot.confidence,
            "no seasonality",
        );
    }
    let southern = ctx.location().is_some_and(|l| l.is_southern());
    let now = Season::at(ctx.timestamp(), southern);
    let (value, verdict) = if tags.contains(&now) {
        (0.2, "in season")
    } else {
        (-0.1, "out of season")
    };
    EffectContribution::new(
        EffectKind::Seasonal,
        value,
        snapshot.confidence,
        format!(
            "{verdict} ({}{})",
            now.as_str(),
            if southern { ", southern hemisphere" } else { "" }
        ),
    )
}

pub fn lunar_phase(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    tables: &ScoringTables,
) -> EffectContribution {
    let info = lunar_info(ctx.timestamp());
    let category = ctx.item().category;
    let value = tables.lunar.get(info.phase).get(category);
    EffectContribution::new(
        EffectKind::LunarPhase,
        value,
        snapshot.confidence,
        format!(
            "{} ({:.0}% illuminated) for {category}",
            info.phase,
            info.illumination * 100.0
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::StaticSource;
    use crate::effects::test_support::*;
    use crate::model::{Category, GeoLocation};

    #[test]
    fn season_tags() {
        let snap = snapshot_from(StaticSource::positions(), 0.7);
        let t = tables();
        let summer = item(Category::Ingredient).in_seasons([Season::Summer]);

        let july = ctx_for(summer.clone(), "2024-07-15T12:00:00Z");
        assert_eq!(seasonal(&snap, &july, &t).value, 0.2);

        let january = ctx_for(summer.clone(), "2024-01-15T12:00:00Z");
        assert_eq!(seasonal(&snap, &january, &t).value, -0.1);

        let sydney_january = crate::model::ScoringContext::builder(summer)
            .at_iso("2024-01-15T12:00:00Z")
            .unwrap()
            .location(GeoLocation::new(-33.9, 151.2).unwrap())
            .build()
            .unwrap();
        let c = seasonal(&snap, &sydney_january, &t);
        assert_eq!(c.value, 0.2);
        assert!(c.note.contains("southern"));

        let untagged = ctx_for(item(Category::Ingredient), "2024-07-15T12:00:00Z");
        assert_eq!(seasonal(&snap, &untagged, &t).value, 0.0);
    }

    #[test]
    fn full_moon_is_strongest_for_recipes() {
        let snap = snapshot_from(StaticSource::positions(), 0.7);
        let t = tables();
        // 2024-01-25 17:54Z full moon, 2024-01-11 11:57Z new moon.
        let full = ctx_for(item(Category::Recipe), "2024-01-25T18:00:00Z");
        let new = ctx_for(item(Category::Recipe), "2024-01-11T12:00:00Z");
        let f = lunar_phase(&snap, &full, &t);
        let n = lunar_phase(&snap, &new, &t);
        assert_eq!(f.value, 0.25);
        assert!(f.note.contains("full moon"));
        assert!(n.value < f.value);
    }
}
