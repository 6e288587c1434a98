//! # Effect calculators
//!
//! Twelve pure, synchronous functions of `(snapshot, context, tables)`. Each
//! returns exactly one `EffectContribution` whose value lies inside the
//! effect's declared range and whose confidence never exceeds the snapshot's
//! source confidence.
//!
//! - `elemental` : item vs current elemental balance
//! - `celestial` : transit, dignity, aspect, retrograde, location
//! - `temporal`  : seasonal, lunar phase
//! - `alchemical`: thermodynamic, Kalchm resonance, Monica optimization
//! - `tarot`     : static category affinity

pub mod alchemical;
pub mod celestial;
pub mod elemental;
pub mod tarot;
pub mod temporal;

use std::fmt;

use serde::Serialize;

use crate::config::ScoringTables;
use crate::model::ScoringContext;
use crate::snapshot::CelestialSnapshot;

/// The twelve effects, in breakdown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    ElementalCompatibility,
    Transit,
    Dignity,
    Aspect,
    Seasonal,
    Thermodynamic,
    Retrograde,
    Location,
    KalchmResonance,
    LunarPhase,
    MonicaOptimization,
    Tarot,
}

impl EffectKind {
    pub const ALL: [EffectKind; 12] = [
        EffectKind::ElementalCompatibility,
        EffectKind::Transit,
        EffectKind::Dignity,
        EffectKind::Aspect,
        EffectKind::Seasonal,
        EffectKind::Thermodynamic,
        EffectKind::Retrograde,
        EffectKind::Location,
        EffectKind::KalchmResonance,
        EffectKind::LunarPhase,
        EffectKind::MonicaOptimization,
        EffectKind::Tarot,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::ElementalCompatibility => "elemental_compatibility",
            EffectKind::Transit => "transit",
            EffectKind::Dignity => "dignity",
            EffectKind::Aspect => "aspect",
            EffectKind::Seasonal => "seasonal",
            EffectKind::Thermodynamic => "thermodynamic",
            EffectKind::Retrograde => "retrograde",
            EffectKind::Location => "location",
            EffectKind::KalchmResonance => "kalchm_resonance",
            EffectKind::LunarPhase => "lunar_phase",
            EffectKind::MonicaOptimization => "monica_optimization",
            EffectKind::Tarot => "tarot",
        }
    }

    pub fn default_weight(&self) -> f64 {
        match self {
            EffectKind::ElementalCompatibility => 0.9,
            EffectKind::Transit => 0.8,
            EffectKind::Dignity | EffectKind::Aspect => 0.7,
            EffectKind::Seasonal | EffectKind::Thermodynamic | EffectKind::Retrograde => 0.6,
            EffectKind::Location | EffectKind::KalchmResonance => 0.5,
            EffectKind::LunarPhase | EffectKind::MonicaOptimization => 0.4,
            EffectKind::Tarot => 0.3,
        }
    }

    /// Declared `(min, max)` of the contribution value.
    pub fn range(&self) -> (f64, f64) {
        match self {
            EffectKind::ElementalCompatibility => (0.0, 0.4),
            EffectKind::Transit => (-0.5, 0.5),
            EffectKind::Dignity | EffectKind::Aspect => (-0.3, 0.3),
            EffectKind::Seasonal | EffectKind::Thermodynamic => (-0.1, 0.2),
            EffectKind::Retrograde => (-0.3, 0.0),
            EffectKind::Location => (-0.2, 0.2),
            EffectKind::KalchmResonance => (-0.05, 0.1),
            EffectKind::LunarPhase => (-0.05, 0.25),
            EffectKind::MonicaOptimization => (-0.03, 0.08),
            EffectKind::Tarot => (0.0, 0.15),
        }
    }

    pub fn evaluate(
        &self,
        snapshot: &CelestialSnapshot,
        ctx: &ScoringContext,
        tables: &ScoringTables,
    ) -> EffectContribution {
        match self {
            EffectKind::ElementalCompatibility => {
                elemental::elemental_compatibility(snapshot, ctx, tables)
            }
            EffectKind::Transit => celestial::transit(snapshot, ctx, tables),
            EffectKind::Dignity => celestial::dignity(snapshot, ctx, tables),
            EffectKind::Aspect => celestial::aspect(snapshot, ctx, tables),
            EffectKind::Seasonal => temporal::seasonal(snapshot, ctx, tables),
            EffectKind::Thermodynamic => alchemical::thermodynamic(snapshot, ctx, tables),
            EffectKind::Retrograde => celestial::retrograde(snapshot, ctx, tables),
            EffectKind::Location => celestial::location(snapshot, ctx, tables),
            EffectKind::KalchmResonance => alchemical::kalchm_resonance(snapshot, ctx, tables),
            EffectKind::LunarPhase => temporal::lunar_phase(snapshot, ctx, tables),
            EffectKind::MonicaOptimization => {
                alchemical::monica_optimization(snapshot, ctx, tables)
            }
            EffectKind::Tarot => tarot::tarot(snapshot, ctx, tables),
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One effect's bounded, explained contribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectContribution {
    pub effect: EffectKind,
    pub value: f64,
    pub note: String,
    pub confidence: f64,
    pub indeterminate: bool,
}

impl EffectContribution {
    /// Value clamped into the effect's range, confidence into `[0, 1]`.
    pub fn new(effect: EffectKind, value: f64, confidence: f64, note: impl Into<String>) -> Self {
        let (lo, hi) = effect.range();
        if !value.is_finite() {
            return Self::indeterminate(effect, note);
        }
        Self {
            effect,
            value: value.clamp(lo, hi),
            note: note.into(),
            confidence: clamp_unit(confidence),
            indeterminate: false,
        }
    }

    /// Zero contribution because the item or context lacks the data.
    pub fn neutral(effect: EffectKind, confidence: f64, note: impl Into<String>) -> Self {
        Self::new(effect, 0.0, confidence, note)
    }

    /// Calculation could not be carried out: no value, no confidence.
    pub fn indeterminate(effect: EffectKind, note: impl Into<String>) -> Self {
        Self {
            effect,
            value: 0.0,
            note: note.into(),
            confidence: 0.0,
            indeterminate: true,
        }
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Run every effect, in `EffectKind::ALL` order.
pub fn evaluate_all(
    snapshot: &CelestialSnapshot,
    ctx: &ScoringContext,
    tables: &ScoringTables,
) -> Vec<EffectContribution> {
    EffectKind::ALL
        .iter()
        .map(|kind| {
            let mut c = kind.evaluate(snapshot, ctx, tables);
            c.confidence = c.confidence.min(snapshot.confidence);
            c
        })
        .collect()
}
