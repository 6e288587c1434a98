//! Tunable coefficient tables.
//!
//! Every section has a built-in default (`default_seed`), so a TOML file only
//! needs to name what it overrides:
//!
//! ```toml
//! sign_share = 0.7
//!
//! [planets.moon]
//! weight = 1.0
//! element = "water"
//! latitude_affinity = 0.4
//!
//! [tarot]
//! recipe = 0.14
//! ```

use serde::{Deserialize, Serialize};

use crate::astro::{LunarPhase, Planet};
use crate::error::ConfigError;
use crate::model::{Category, Element, ElementalComposition};

/// Per-body coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanetCoefficients {
    /// Influence on elemental totals and transit strength.
    pub weight: f64,
    /// Intrinsic element of the body.
    pub element: Element,
    /// -1 (favours the equator) .. +1 (favours high latitudes).
    pub latitude_affinity: f64,
}

impl PlanetCoefficients {
    const fn new(weight: f64, element: Element, latitude_affinity: f64) -> Self {
        Self {
            weight,
            element,
            latitude_affinity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanetTable {
    pub sun: PlanetCoefficients,
    pub moon: PlanetCoefficients,
    pub mercury: PlanetCoefficients,
    pub venus: PlanetCoefficients,
    pub mars: PlanetCoefficients,
    pub jupiter: PlanetCoefficients,
    pub saturn: PlanetCoefficients,
    pub uranus: PlanetCoefficients,
    pub neptune: PlanetCoefficients,
    pub pluto: PlanetCoefficients,
}

impl PlanetTable {
    pub fn get(&self, planet: Planet) -> &PlanetCoefficients {
        match planet {
            Planet::Sun => &self.sun,
            Planet::Moon => &self.moon,
            Planet::Mercury => &self.mercury,
            Planet::Venus => &self.venus,
            Planet::Mars => &self.mars,
            Planet::Jupiter => &self.jupiter,
            Planet::Saturn => &self.saturn,
            Planet::Uranus => &self.uranus,
            Planet::Neptune => &self.neptune,
            Planet::Pluto => &self.pluto,
        }
    }
}

impl Default for PlanetTable {
    fn default() -> Self {
        use Element::*;
        Self {
            sun: PlanetCoefficients::new(1.0, Fire, -0.4),
            moon: PlanetCoefficients::new(0.9, Water, 0.3),
            mercury: PlanetCoefficients::new(0.6, Air, 0.1),
            venus: PlanetCoefficients::new(0.6, Earth, -0.2),
            mars: PlanetCoefficients::new(0.6, Fire, -0.5),
            jupiter: PlanetCoefficients::new(0.5, Fire, -0.3),
            saturn: PlanetCoefficients::new(0.5, Earth, 0.6),
            uranus: PlanetCoefficients::new(0.3, Air, 0.4),
            neptune: PlanetCoefficients::new(0.3, Water, 0.2),
            pluto: PlanetCoefficients::new(0.2, Water, 0.5),
        }
    }
}

/// Linear weights of one ESMS property over the four elements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementRow {
    #[serde(default)]
    pub fire: f64,
    #[serde(default)]
    pub water: f64,
    #[serde(default)]
    pub earth: f64,
    #[serde(default)]
    pub air: f64,
}

impl ElementRow {
    const fn new(fire: f64, water: f64, earth: f64, air: f64) -> Self {
        Self {
            fire,
            water,
            earth,
            air,
        }
    }

    pub fn apply(&self, c: &ElementalComposition) -> f64 {
        self.fire * c.fire() + self.water * c.water() + self.earth * c.earth() + self.air * c.air()
    }

    fn values(&self) -> [f64; 4] {
        [self.fire, self.water, self.earth, self.air]
    }
}

/// Elements → Spirit/Essence/Matter/Substance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EsmsTransform {
    pub spirit: ElementRow,
    pub essence: ElementRow,
    pub matter: ElementRow,
    pub substance: ElementRow,
}

impl EsmsTransform {
    fn rows(&self) -> [(&'static str, &ElementRow); 4] {
        [
            ("spirit", &self.spirit),
            ("essence", &self.essence),
            ("matter", &self.matter),
            ("substance", &self.substance),
        ]
    }
}

impl Default for EsmsTransform {
    fn default() -> Self {
        // Each element column sums to 1, so ESMS also sums to 1.
        Self {
            spirit: ElementRow::new(0.6, 0.0, 0.0, 0.4),
            essence: ElementRow::new(0.2, 0.5, 0.0, 0.3),
            matter: ElementRow::new(0.0, 0.3, 0.7, 0.0),
            substance: ElementRow::new(0.2, 0.2, 0.3, 0.3),
        }
    }
}

/// One number per item category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryAffinity {
    #[serde(default)]
    pub ingredient: f64,
    #[serde(default)]
    pub recipe: f64,
    #[serde(default)]
    pub cuisine: f64,
    #[serde(default)]
    pub method: f64,
}

impl CategoryAffinity {
    pub const fn new(ingredient: f64, recipe: f64, cuisine: f64, method: f64) -> Self {
        Self {
            ingredient,
            recipe,
            cuisine,
            method,
        }
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Ingredient => self.ingredient,
            Category::Recipe => self.recipe,
            Category::Cuisine => self.cuisine,
            Category::Method => self.method,
        }
    }

    fn values(&self) -> [f64; 4] {
        [self.ingredient, self.recipe, self.cuisine, self.method]
    }
}

impl Default for CategoryAffinity {
    fn default() -> Self {
        Self::new(0.08, 0.12, 0.10, 0.06)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LunarTable {
    pub new_moon: CategoryAffinity,
    pub waxing_crescent: CategoryAffinity,
    pub first_quarter: CategoryAffinity,
    pub waxing_gibbous: CategoryAffinity,
    pub full_moon: CategoryAffinity,
    pub waning_gibbous: CategoryAffinity,
    pub last_quarter: CategoryAffinity,
    pub waning_crescent: CategoryAffinity,
}

impl LunarTable {
    pub fn get(&self, phase: LunarPhase) -> &CategoryAffinity {
        match phase {
            LunarPhase::NewMoon => &self.new_moon,
            LunarPhase::WaxingCrescent => &self.waxing_crescent,
            LunarPhase::FirstQuarter => &self.first_quarter,
            LunarPhase::WaxingGibbous => &self.waxing_gibbous,
            LunarPhase::FullMoon => &self.full_moon,
            LunarPhase::WaningGibbous => &self.waning_gibbous,
            LunarPhase::LastQuarter => &self.last_quarter,
            LunarPhase::WaningCrescent => &self.waning_crescent,
        }
    }
}

impl Default for LunarTable {
    fn default() -> Self {
        Self {
            new_moon: CategoryAffinity::new(0.10, 0.05, 0.02, -0.02),
            waxing_crescent: CategoryAffinity::new(0.08, 0.08, 0.04, 0.05),
            first_quarter: CategoryAffinity::new(0.06, 0.10, 0.06, 0.10),
            waxing_gibbous: CategoryAffinity::new(0.10, 0.14, 0.10, 0.12),
            full_moon: CategoryAffinity::new(0.22, 0.25, 0.20, 0.18),
            waning_gibbous: CategoryAffinity::new(0.08, 0.10, 0.12, 0.06),
            last_quarter: CategoryAffinity::new(0.04, 0.02, 0.06, 0.0),
            waning_crescent: CategoryAffinity::new(0.02, -0.02, 0.0, -0.05),
        }
    }
}

/// All coefficient tables used by the alchemical state and the effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringTables {
    /// Share of a body's weight given to the element of its sign (the rest
    /// goes to its intrinsic element).
    pub sign_share: f64,
    /// Elemental Compatibility for two compositions with no shared mass.
    pub elemental_floor: f64,
    /// Lower bound on Kalchm bases and exponents.
    pub kalchm_floor: f64,
    /// Magnitude of the ESMS quantities: they sum to this value. Kalchm
    /// only leaves its neutral band `[0.5, 2]` when ESMS are well above 1.
    pub esms_scale: f64,
    /// How far preferred elements pull the compatibility target.
    pub preference_blend: f64,
    pub planets: PlanetTable,
    pub esms: EsmsTransform,
    pub lunar: LunarTable,
    pub tarot: CategoryAffinity,
}

impl Default for ScoringTables {
    fn default() -> Self {
        default_seed()
    }
}

/// Built-in coefficients.
pub fn default_seed() -> ScoringTables {
    ScoringTables {
        sign_share: 0.75,
        elemental_floor: 0.7,
        kalchm_floor: 0.01,
        esms_scale: 4.0,
        preference_blend: 0.25,
        planets: PlanetTable::default(),
        esms: EsmsTransform::default(),
        lunar: LunarTable::default(),
        tarot: CategoryAffinity::default(),
    }
}

fn invalid(key: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        reason: reason.into(),
    }
}

fn unit_interval(key: &str, v: f64) -> Result<(), ConfigError> {
    if !v.is_finite() || !(0.0..=1.0).contains(&v) {
        return Err(invalid(key, format!("{v} outside [0, 1]")));
    }
    Ok(())
}

impl ScoringTables {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let tables: ScoringTables = toml::from_str(s)?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("sign_share", self.sign_share)?;
        unit_interval("elemental_floor", self.elemental_floor)?;
        unit_interval("preference_blend", self.preference_blend)?;
        if !self.kalchm_floor.is_finite() || self.kalchm_floor <= 0.0 || self.kalchm_floor > 1.0 {
            return Err(invalid("kalchm_floor", "must be in (0, 1]"));
        }
        if !self.esms_scale.is_finite() || self.esms_scale <= 0.0 {
            return Err(invalid("esms_scale", "must be finite and positive"));
        }

        for planet in Planet::ALL {
            let c = self.planets.get(planet);
            if !c.weight.is_finite() || c.weight < 0.0 {
                return Err(invalid(
                    format!("planets.{planet}.weight"),
                    "must be finite and non-negative",
                ));
            }
            if !c.latitude_affinity.is_finite() || !(-1.0..=1.0).contains(&c.latitude_affinity) {
                return Err(invalid(
                    format!("planets.{planet}.latitude_affinity"),
                    "must be in [-1, 1]",
                ));
            }
        }

        for (name, row) in self.esms.rows() {
            if row.values().iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(invalid(
                    format!("esms.{name}"),
                    "coefficients must be finite and non-negative",
                ));
            }
        }
        for (i, col) in ["fire", "water", "earth", "air"].iter().enumerate() {
            let sum: f64 = self.esms.rows().iter().map(|(_, r)| r.values()[i]).sum();
            if sum <= 0.0 {
                return Err(invalid(
                    format!("esms.*.{col}"),
                    "element is not mapped to any property",
                ));
            }
        }

        for phase in LunarPhase::ALL {
            let row = self.lunar.get(phase);
            if row.values().iter().any(|v| !v.is_finite() || !(-0.05..=0.25).contains(v)) {
                return Err(invalid(format!("lunar.{phase}"), "affinity outside [-0.05, 0.25]"));
            }
        }
        if self
            .tarot
            .values()
            .iter()
            .any(|v| !v.is_finite() || !(0.0..=0.15).contains(v))
        {
            return Err(invalid("tarot", "affinity outside [0, 0.15]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_valid() {
        default_seed().validate().unwrap();
    }

    #[test]
    fn esms_columns_sum_to_one() {
        let t = EsmsTransform::default();
        for i in 0..4 {
            let sum: f64 = t.rows().iter().map(|(_, r)| r.values()[i]).sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn partial_toml_overrides_keep_defaults() {
        let t = ScoringTables::from_toml_str(
            r#"
            sign_share = 0.6

            [planets.moon]
            weight = 1.0
            element = "water"
            latitude_affinity = 0.4

            [tarot]
            recipe = 0.14
            "#,
        )
        .unwrap();
        assert_eq!(t.sign_share, 0.6);
        assert_eq!(t.planets.moon.weight, 1.0);
        assert_eq!(t.planets.sun, default_seed().planets.sun);
        assert_eq!(t.tarot.recipe, 0.14);
        // Fields not named inside an overridden section fall back to zero.
        assert_eq!(t.tarot.method, 0.0);
        assert_eq!(t.lunar, LunarTable::default());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(ScoringTables::from_toml_str("sign_share = 1.5").is_err());
        assert!(ScoringTables::from_toml_str("kalchm_floor = 0.0").is_err());
        assert!(ScoringTables::from_toml_str("esms_scale = 0.0").is_err());
        assert!(ScoringTables::from_toml_str("[tarot]\nrecipe = 0.5").is_err());
        assert!(ScoringTables::from_toml_str("unknown_key = 1").is_err());
    }

    #[test]
    fn lunar_full_moon_is_strongest() {
        let t = LunarTable::default();
        for c in Category::ALL {
            let full = t.get(LunarPhase::FullMoon).get(c);
            for p in LunarPhase::ALL {
                assert!(t.get(p).get(c) <= full);
            }
        }
    }
}
