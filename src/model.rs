//! # Scoring inputs
//!
//! Value types describing *what* is scored (`ScoringItem`) and *when/where*
//! (`ScoringContext`). Both are validated at construction; anything that
//! reaches the calculators is known to be well-formed.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::EffectWeights;
use crate::astro::Planet;
use crate::error::ScoringError;

/// Accepted deviation of an input composition from 1.0 before it is renormalized.
pub const COMPOSITION_TOLERANCE: f64 = 1e-3;

/// Supported timestamp window (inclusive years).
pub const MIN_YEAR: i32 = 1800;
pub const MAX_YEAR: i32 = 2200;

/// The four classical elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    #[serde(alias = "Fire")]
    Fire,
    #[serde(alias = "Water")]
    Water,
    #[serde(alias = "Earth")]
    Earth,
    #[serde(alias = "Air")]
    Air,
}

impl Element {
    pub const ALL: [Element; 4] = [Element::Fire, Element::Water, Element::Earth, Element::Air];

    pub fn as_str(&self) -> &'static str {
        match self {
            Element::Fire => "fire",
            Element::Water => "water",
            Element::Earth => "earth",
            Element::Air => "air",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw, unvalidated Fire/Water/Earth/Air weights (wire shape).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementalInput {
    #[serde(default, alias = "Fire")]
    pub fire: f64,
    #[serde(default, alias = "Water")]
    pub water: f64,
    #[serde(default, alias = "Earth")]
    pub earth: f64,
    #[serde(default, alias = "Air")]
    pub air: f64,
}

/// Normalized elemental composition. Always non-negative and summing to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ElementalInput")]
pub struct ElementalComposition {
    fire: f64,
    water: f64,
    earth: f64,
    air: f64,
}

impl ElementalComposition {
    /// Validate an input composition: finite, non-negative, summing to 1
    /// within `COMPOSITION_TOLERANCE`. The result is renormalized exactly.
    pub fn new(fire: f64, water: f64, earth: f64, air: f64) -> Result<Self, ScoringError> {
        let parts = [fire, water, earth, air];
        if parts.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ScoringError::invalid(
                "elements",
                "weights must be finite and non-negative",
            ));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > COMPOSITION_TOLERANCE {
            return Err(ScoringError::invalid(
                "elements",
                format!("weights must sum to 1.0 (got {sum:.4})"),
            ));
        }
        Ok(Self::scaled(parts, sum))
    }

    /// Normalize arbitrary non-negative totals. Returns the balanced
    /// composition when the totals are empty or unusable.
    pub fn normalized(fire: f64, water: f64, earth: f64, air: f64) -> Self {
        let parts = [fire, water, earth, air].map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 });
        let sum: f64 = parts.iter().sum();
        if sum <= f64::EPSILON {
            return Self::balanced();
        }
        Self::scaled(parts, sum)
    }

    pub fn balanced() -> Self {
        Self {
            fire: 0.25,
            water: 0.25,
            earth: 0.25,
            air: 0.25,
        }
    }

    /// Composition made of one element only.
    pub fn pure(element: Element) -> Self {
        let mut parts = [0.0; 4];
        parts[element_slot(element)] = 1.0;
        Self::scaled(parts, 1.0)
    }

    fn scaled(parts: [f64; 4], sum: f64) -> Self {
        Self {
            fire: parts[0] / sum,
            water: parts[1] / sum,
            earth: parts[2] / sum,
            air: parts[3] / sum,
        }
    }

    pub fn fire(&self) -> f64 {
        self.fire
    }
    pub fn water(&self) -> f64 {
        self.water
    }
    pub fn earth(&self) -> f64 {
        self.earth
    }
    pub fn air(&self) -> f64 {
        self.air
    }

    pub fn get(&self, element: Element) -> f64 {
        match element {
            Element::Fire => self.fire,
            Element::Water => self.water,
            Element::Earth => self.earth,
            Element::Air => self.air,
        }
    }

    pub fn total(&self) -> f64 {
        self.fire + self.water + self.earth + self.air
    }

    /// Element with the largest share (ties resolved in `Element::ALL` order).
    pub fn dominant(&self) -> Element {
        let mut best = Element::Fire;
        for e in Element::ALL {
            if self.get(e) > self.get(best) {
                best = e;
            }
        }
        best
    }

    /// Convex blend: `self * (1 - t) + other * t`.
    pub fn blend(&self, other: &ElementalComposition, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: f64, b: f64| a * (1.0 - t) + b * t;
        Self::normalized(
            mix(self.fire, other.fire),
            mix(self.water, other.water),
            mix(self.earth, other.earth),
            mix(self.air, other.air),
        )
    }
}

impl TryFrom<ElementalInput> for ElementalComposition {
    type Error = ScoringError;

    fn try_from(raw: ElementalInput) -> Result<Self, Self::Error> {
        Self::new(raw.fire, raw.water, raw.earth, raw.air)
    }
}

impl From<ElementalComposition> for ElementalInput {
    fn from(c: ElementalComposition) -> Self {
        Self {
            fire: c.fire,
            water: c.water,
            earth: c.earth,
            air: c.air,
        }
    }
}

fn element_slot(e: Element) -> usize {
    match e {
        Element::Fire => 0,
        Element::Water => 1,
        Element::Earth => 2,
        Element::Air => 3,
    }
}

/// What kind of candidate is being ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[serde(alias = "Ingredient")]
    Ingredient,
    #[serde(alias = "Recipe")]
    Recipe,
    #[serde(alias = "Cuisine")]
    Cuisine,
    #[serde(alias = "Method")]
    Method,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Ingredient,
        Category::Recipe,
        Category::Cuisine,
        Category::Method,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ingredient => "ingredient",
            Category::Recipe => "recipe",
            Category::Cuisine => "cuisine",
            Category::Method => "method",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Meteorological-style season of the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    #[serde(alias = "Spring")]
    Spring,
    #[serde(alias = "Summer")]
    Summer,
    #[serde(alias = "Autumn", alias = "fall", alias = "Fall")]
    Autumn,
    #[serde(alias = "Winter")]
    Winter,
}

impl Season {
    /// Season at `at`, using equinox/solstice boundaries (20-21 of Mar/Jun/Sep/Dec).
    /// The southern hemisphere gets the opposite season.
    pub fn at(at: DateTime<Utc>, southern_hemisphere: bool) -> Self {
        let (m, d) = (at.month(), at.day());
        let after = |month: u32, day: u32| m > month || (m == month && d >= day);
        let northern = if !after(3, 20) || after(12, 21) {
            Season::Winter
        } else if !after(6, 21) {
            Season::Spring
        } else if !after(9, 22) {
            Season::Summer
        } else {
            Season::Autumn
        };
        if southern_hemisphere {
            northern.opposite()
        } else {
            northern
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Season::Spring => Season::Autumn,
            Season::Summer => Season::Winter,
            Season::Autumn => Season::Spring,
            Season::Winter => Season::Summer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }
}

impl FromStr for Season {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" | "fall" => Ok(Season::Autumn),
            "winter" => Ok(Season::Winter),
            other => Err(ScoringError::invalid("seasons", format!("unknown season `{other}`"))),
        }
    }
}

/// Geographic coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ScoringError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ScoringError::invalid(
                "location",
                format!("latitude {latitude} outside [-90, 90]"),
            ));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ScoringError::invalid(
                "location",
                format!("longitude {longitude} outside [-180, 180]"),
            ));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn is_southern(&self) -> bool {
        self.latitude < 0.0
    }
}

/// Candidate item to be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringItem {
    pub name: String,
    pub category: Category,
    pub elements: ElementalComposition,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub ruling_bodies: BTreeSet<Planet>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub seasons: BTreeSet<Season>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origins: Vec<String>,
}

impl ScoringItem {
    pub fn new(
        name: impl Into<String>,
        category: Category,
        elements: ElementalComposition,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            elements,
            ruling_bodies: BTreeSet::new(),
            seasons: BTreeSet::new(),
            origins: Vec::new(),
        }
    }

    pub fn ruled_by(mut self, bodies: impl IntoIterator<Item = Planet>) -> Self {
        self.ruling_bodies.extend(bodies);
        self
    }

    pub fn in_seasons(mut self, seasons: impl IntoIterator<Item = Season>) -> Self {
        self.seasons.extend(seasons);
        self
    }

    fn validate(&self) -> Result<(), ScoringError> {
        if self.name.trim().is_empty() {
            return Err(ScoringError::invalid("item.name", "must not be empty"));
        }
        if (self.elements.total() - 1.0).abs() > 1e-6 {
            return Err(ScoringError::invalid("item.elements", "composition is not normalized"));
        }
        if self.origins.iter().any(|o| o.trim().is_empty()) {
            return Err(ScoringError::invalid("item.origins", "tags must not be blank"));
        }
        Ok(())
    }
}

/// Optional hints about what the user leans toward.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_elements: Vec<Element>,
}

impl UserPreferences {
    /// Even composition across the preferred elements, if any.
    pub fn elemental_target(&self) -> Option<ElementalComposition> {
        if self.preferred_elements.is_empty() {
            return None;
        }
        let share = |e: Element| self.preferred_elements.iter().filter(|p| **p == e).count() as f64;
        Some(ElementalComposition::normalized(
            share(Element::Fire),
            share(Element::Water),
            share(Element::Earth),
            share(Element::Air),
        ))
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringOptions {
    pub weights: EffectWeights,
    /// Budget for the whole data-source chain, measured from the call.
    pub deadline: Option<Duration>,
}

/// Immutable description of one scoring request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringContext {
    timestamp: DateTime<Utc>,
    location: Option<GeoLocation>,
    item: ScoringItem,
    preferences: Option<UserPreferences>,
    options: ScoringOptions,
}

impl ScoringContext {
    pub fn builder(item: ScoringItem) -> ScoringContextBuilder {
        ScoringContextBuilder {
            item,
            timestamp: None,
            location: None,
            preferences: None,
            options: ScoringOptions::default(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    pub fn location(&self) -> Option<GeoLocation> {
        self.location
    }
    pub fn item(&self) -> &ScoringItem {
        &self.item
    }
    pub fn preferences(&self) -> Option<&UserPreferences> {
        self.preferences.as_ref()
    }
    pub fn options(&self) -> &ScoringOptions {
        &self.options
    }

    /// Same timestamp/location/options for a different candidate (batch scoring).
    pub fn with_item(&self, item: ScoringItem) -> Result<Self, ScoringError> {
        item.validate()?;
        Ok(Self {
            item,
            ..self.clone()
        })
    }
}

pub struct ScoringContextBuilder {
    item: ScoringItem,
    timestamp: Option<DateTime<Utc>>,
    location: Option<GeoLocation>,
    preferences: Option<UserPreferences>,
    options: ScoringOptions,
}

impl ScoringContextBuilder {
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Parse an RFC 3339 / ISO-8601 timestamp.
    pub fn at_iso(self, timestamp: &str) -> Result<Self, ScoringError> {
        let ts = DateTime::parse_from_rfc3339(timestamp.trim())
            .map_err(|e| ScoringError::invalid("timestamp", format!("`{timestamp}`: {e}")))?;
        Ok(self.at(ts.with_timezone(&Utc)))
    }

    pub fn location(mut self, location: GeoLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn preferences(mut self, preferences: UserPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn weights(mut self, weights: EffectWeights) -> Self {
        self.options.weights = weights;
        self
    }

    pub fn deadline(mut self, budget: Duration) -> Self {
        self.options.deadline = Some(budget);
        self
    }

    pub fn build(self) -> Result<ScoringContext, ScoringError> {
        self.item.validate()?;
        let timestamp = self.timestamp.unwrap_or_else(Utc::now);
        if !(MIN_YEAR..=MAX_YEAR).contains(&timestamp.year()) {
            return Err(ScoringError::invalid(
                "timestamp",
                format!("year {} outside {MIN_YEAR}..={MAX_YEAR}", timestamp.year()),
            ));
        }
        self.options.weights.validate()?;
        Ok(ScoringContext {
            timestamp,
            location: self.location,
            item: self.item,
            preferences: self.preferences,
            options: self.options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn basil() -> ScoringItem {
        ScoringItem::new(
            "basil",
            Category::Ingredient,
            ElementalComposition::new(0.4, 0.1, 0.2, 0.3).unwrap(),
        )
    }

    #[test]
    fn composition_rejects_bad_sums_and_negatives() {
        assert!(ElementalComposition::new(0.5, 0.5, 0.5, 0.0).is_err());
        assert!(ElementalComposition::new(-0.1, 0.6, 0.3, 0.2).is_err());
        assert!(ElementalComposition::new(f64::NAN, 0.5, 0.5, 0.0).is_err());
    }

    #[test]
    fn composition_renormalizes_within_tolerance() {
        let c = ElementalComposition::new(0.2502, 0.25, 0.25, 0.25).unwrap();
        assert!((c.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn normalized_falls_back_to_balanced() {
        let c = ElementalComposition::normalized(0.0, 0.0, 0.0, 0.0);
        assert_eq!(c, ElementalComposition::balanced());
        let d = ElementalComposition::normalized(2.0, 0.0, 2.0, 0.0);
        assert!((d.fire() - 0.5).abs() < 1e-12);
        assert_eq!(d.dominant(), Element::Fire);
    }

    #[test]
    fn composition_deserializes_with_validation() {
        let ok: ElementalComposition =
            serde_json::from_str(r#"{"Fire":1.0,"water":0,"earth":0,"air":0}"#).unwrap();
        assert_eq!(ok.dominant(), Element::Fire);
        let bad = serde_json::from_str::<ElementalComposition>(r#"{"fire":0.9}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn seasons_follow_hemisphere() {
        let july = Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap();
        assert_eq!(Season::at(july, false), Season::Summer);
        assert_eq!(Season::at(july, true), Season::Winter);
        let jan = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        assert_eq!(Season::at(jan, false), Season::Winter);
        let oct = Utc.with_ymd_and_hms(2024, 10, 16, 0, 0, 0).unwrap();
        assert_eq!(Season::at(oct, false), Season::Autumn);
        assert_eq!("Fall".parse::<Season>().unwrap(), Season::Autumn);
    }

    #[test]
    fn context_rejects_out_of_range_inputs() {
        let early = Utc.with_ymd_and_hms(1500, 1, 1, 0, 0, 0).unwrap();
        assert!(ScoringContext::builder(basil()).at(early).build().is_err());
        assert!(ScoringContext::builder(basil()).at_iso("not-a-date").is_err());
        assert!(GeoLocation::new(91.0, 0.0).is_err());
        let mut unnamed = basil();
        unnamed.name = "  ".into();
        assert!(ScoringContext::builder(unnamed).build().is_err());
        let mut tagged = basil();
        tagged.origins = vec!["italian".into(), " ".into()];
        assert!(ScoringContext::builder(tagged).build().is_err());
    }

    #[test]
    fn with_item_keeps_timestamp_and_location() {
        let ctx = ScoringContext::builder(basil())
            .at_iso("2024-05-01T12:00:00Z")
            .unwrap()
            .location(GeoLocation::new(40.7, -73.8).unwrap())
            .build()
            .unwrap();
        let other = ScoringItem::new("tea", Category::Recipe, ElementalComposition::balanced());
        let next = ctx.with_item(other).unwrap();
        assert_eq!(next.timestamp(), ctx.timestamp());
        assert_eq!(next.location(), ctx.location());
        assert_eq!(next.item().name, "tea");
    }

    #[test]
    fn preferences_build_even_target() {
        let prefs = UserPreferences {
            preferred_elements: vec![Element::Water, Element::Earth],
        };
        let t = prefs.elemental_target().unwrap();
        assert!((t.water() - 0.5).abs() < 1e-12);
        assert!((t.earth() - 0.5).abs() < 1e-12);
        assert!(UserPreferences::default().elemental_target().is_none());
    }
}
