//! # Aggregation
//!
//! `score = clamp(0.5 + Σ wᵢ·nᵢ / Σ wᵢ, 0, 1)` where `nᵢ` is the value
//! divided by its range width and `wᵢ = default_weightᵢ × clamp(multiplierᵢ, 0, 2)`.
//! Confidence is the `wᵢ`-weighted mean of contribution confidences.

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alchemy::AlchemicalState;
use crate::effects::{EffectContribution, EffectKind};
use crate::error::ScoringError;
use crate::model::{Category, ScoringItem};
use crate::snapshot::CelestialSnapshot;

pub const BASELINE: f64 = 0.5;
pub const MAX_MULTIPLIER: f64 = 2.0;
const DOMINANT_COUNT: usize = 3;

fn one() -> f64 {
    1.0
}

/// Per-call multipliers on the default effect weights. `0` mutes an effect,
/// values above 2 are capped at 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectWeights {
    #[serde(default = "one")]
    pub elemental_compatibility: f64,
    #[serde(default = "one")]
    pub transit: f64,
    #[serde(default = "one")]
    pub dignity: f64,
    #[serde(default = "one")]
    pub aspect: f64,
    #[serde(default = "one")]
    pub seasonal: f64,
    #[serde(default = "one")]
    pub thermodynamic: f64,
    #[serde(default = "one")]
    pub retrograde: f64,
    #[serde(default = "one")]
    pub location: f64,
    #[serde(default = "one")]
    pub kalchm_resonance: f64,
    #[serde(default = "one")]
    pub lunar_phase: f64,
    #[serde(default = "one")]
    pub monica_optimization: f64,
    #[serde(default = "one")]
    pub tarot: f64,
}

impl Default for EffectWeights {
    fn default() -> Self {
        Self {
            elemental_compatibility: 1.0,
            transit: 1.0,
            dignity: 1.0,
            aspect: 1.0,
            seasonal: 1.0,
            thermodynamic: 1.0,
            retrograde: 1.0,
            location: 1.0,
            kalchm_resonance: 1.0,
            lunar_phase: 1.0,
            monica_optimization: 1.0,
            tarot: 1.0,
        }
    }
}

impl EffectWeights {
    pub fn multiplier(&self, kind: EffectKind) -> f64 {
        match kind {
            EffectKind::ElementalCompatibility => self.elemental_compatibility,
            EffectKind::Transit => self.transit,
            EffectKind::Dignity => self.dignity,
            EffectKind::Aspect => self.aspect,
            EffectKind::Seasonal => self.seasonal,
            EffectKind::Thermodynamic => self.thermodynamic,
            EffectKind::Retrograde => self.retrograde,
            EffectKind::Location => self.location,
            EffectKind::KalchmResonance => self.kalchm_resonance,
            EffectKind::LunarPhase => self.lunar_phase,
            EffectKind::MonicaOptimization => self.monica_optimization,
            EffectKind::Tarot => self.tarot,
        }
    }

    pub fn set(&mut self, kind: EffectKind, value: f64) {
        let slot = match kind {
            EffectKind::ElementalCompatibility => &mut self.elemental_compatibility,
            EffectKind::Transit => &mut self.transit,
            EffectKind::Dignity => &mut self.dignity,
            EffectKind::Aspect => &mut self.aspect,
            EffectKind::Seasonal => &mut self.seasonal,
            EffectKind::Thermodynamic => &mut self.thermodynamic,
            EffectKind::Retrograde => &mut self.retrograde,
            EffectKind::Location => &mut self.location,
            EffectKind::KalchmResonance => &mut self.kalchm_resonance,
            EffectKind::LunarPhase => &mut self.lunar_phase,
            EffectKind::MonicaOptimization => &mut self.monica_optimization,
            EffectKind::Tarot => &mut self.tarot,
        };
        *slot = value;
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        for kind in EffectKind::ALL {
            let m = self.multiplier(kind);
            if !m.is_finite() || m < 0.0 {
                return Err(ScoringError::invalid(
                    "weights",
                    format!("{kind} multiplier must be finite and non-negative (got {m})"),
                ));
            }
        }
        Ok(())
    }

    /// `default_weight × clamp(multiplier, 0, 2)`.
    pub fn effective(&self, kind: EffectKind) -> f64 {
        kind.default_weight() * self.multiplier(kind).clamp(0.0, MAX_MULTIPLIER)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultMetadata {
    /// Tier(s) that produced the positions.
    pub sources: Vec<String>,
    pub warnings: Vec<String>,
    pub resolved_for: DateTime<Utc>,
    pub state: AlchemicalState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringResult {
    pub item: String,
    pub category: Category,
    pub score: f64,
    pub confidence: f64,
    pub breakdown: Vec<EffectContribution>,
    pub dominant_effects: Vec<EffectKind>,
    pub metadata: ResultMetadata,
}

impl ScoringResult {
    pub fn contribution(&self, kind: EffectKind) -> Option<&EffectContribution> {
        self.breakdown.iter().find(|c| c.effect == kind)
    }
}

pub fn aggregate(
    item: &ScoringItem,
    contributions: Vec<EffectContribution>,
    weights: &EffectWeights,
    snapshot: &CelestialSnapshot,
) -> ScoringResult {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut confidence_sum = 0.0;
    let mut impacts: Vec<(EffectKind, f64)> = Vec::with_capacity(contributions.len());
    let mut warnings = snapshot.warnings.clone();

    for c in &contributions {
        let w = weights.effective(c.effect);
        let (lo, hi) = c.effect.range();
        let normalized = c.value / (hi - lo);
        weighted_sum += w * normalized;
        weight_total += w;
        confidence_sum += w * c.confidence;
        impacts.push((c.effect, (w * c.value).abs()));

        if c.indeterminate {
            counter!("scoring_indeterminate_total").increment(1);
            warnings.push(format!("{}: {}", c.effect, c.note));
        }
    }

    let (score, confidence) = if weight_total > 0.0 {
        (
            (BASELINE + weighted_sum / weight_total).clamp(0.0, 1.0),
            (confidence_sum / weight_total).clamp(0.0, 1.0),
        )
    } else {
        warnings.push("all effect weights are zero, score is the baseline".to_string());
        (BASELINE, 0.0)
    };

    // Stable sort keeps breakdown order among equal impacts.
    impacts.sort_by(|a, b| b.1.total_cmp(&a.1));
    let dominant_effects = impacts
        .into_iter()
        .filter(|(_, impact)| *impact > 0.0)
        .take(DOMINANT_COUNT)
        .map(|(k, _)| k)
        .collect();

    histogram!("scoring_score").record(score);
    histogram!("scoring_confidence").record(confidence);
    debug!(
        target: "scoring",
        item = %item.name,
        score,
        confidence,
        source = snapshot.source,
        "aggregated"
    );

    ScoringResult {
        item: item.name.clone(),
        category: item.category,
        score,
        confidence,
        breakdown: contributions,
        dominant_effects,
        metadata: ResultMetadata {
            sources: vec![snapshot.source.to_string()],
            warnings,
            resolved_for: snapshot.resolved_for,
            state: snapshot.state.clone(),
        },
    }
}
