//! Immutable celestial snapshot: positions, derived state and provenance.
//! One snapshot backs every effect of a scoring call.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alchemy::{self, AlchemicalState};
use crate::astro::{PositionsData, Resolution, StaticSource};
use crate::config::ScoringTables;

/// Source label used when no tier produced positions.
pub const UNRESOLVED_SOURCE: &str = "none";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CelestialSnapshot {
    pub positions: PositionsData,
    pub state: AlchemicalState,
    /// Confidence of the tier that produced `positions`.
    pub confidence: f64,
    pub source: &'static str,
    pub warnings: Vec<String>,
    /// Canonical (hour-floored) moment the positions were resolved for.
    pub resolved_for: DateTime<Utc>,
}

impl CelestialSnapshot {
    pub fn from_resolution(
        resolution: Resolution,
        resolved_for: DateTime<Utc>,
        tables: &ScoringTables,
    ) -> Self {
        let (state, mut warnings) = alchemy::derive(&resolution.positions, tables);
        let mut all = resolution.warnings;
        all.append(&mut warnings);
        Self {
            positions: resolution.positions,
            state,
            confidence: resolution.confidence,
            source: resolution.source,
            warnings: all,
            resolved_for,
        }
    }

    /// Zero-confidence snapshot for when the whole chain failed. Uses the
    /// static positions so every effect still has something to read.
    pub fn unresolved(
        resolved_for: DateTime<Utc>,
        tables: &ScoringTables,
        mut warnings: Vec<String>,
    ) -> Self {
        let positions = StaticSource::positions();
        let (state, mut extra) = alchemy::derive(&positions, tables);
        warnings.push("no astronomical source succeeded, result has zero confidence".to_string());
        warnings.append(&mut extra);
        Self {
            positions,
            state,
            confidence: 0.0,
            source: UNRESOLVED_SOURCE,
            warnings,
            resolved_for,
        }
    }
}
