//! Lunar phase from the mean synodic month.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const SYNODIC_MONTH_DAYS: f64 = 29.530_588_67;

/// 2023-01-21T20:53Z, a new moon.
fn reference_new_moon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 21, 20, 53, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LunarPhase {
    NewMoon,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    FullMoon,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl LunarPhase {
    pub const ALL: [LunarPhase; 8] = [
        LunarPhase::NewMoon,
        LunarPhase::WaxingCrescent,
        LunarPhase::FirstQuarter,
        LunarPhase::WaxingGibbous,
        LunarPhase::FullMoon,
        LunarPhase::WaningGibbous,
        LunarPhase::LastQuarter,
        LunarPhase::WaningCrescent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LunarPhase::NewMoon => "new moon",
            LunarPhase::WaxingCrescent => "waxing crescent",
            LunarPhase::FirstQuarter => "first quarter",
            LunarPhase::WaxingGibbous => "waxing gibbous",
            LunarPhase::FullMoon => "full moon",
            LunarPhase::WaningGibbous => "waning gibbous",
            LunarPhase::LastQuarter => "last quarter",
            LunarPhase::WaningCrescent => "waning crescent",
        }
    }
}

impl fmt::Display for LunarPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase octant plus illuminated fraction of the disc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LunarInfo {
    pub phase: LunarPhase,
    /// Position in the cycle, `[0, 1)`, 0 = new moon.
    pub cycle: f64,
    pub illumination: f64,
}

pub fn lunar_info(at: DateTime<Utc>) -> LunarInfo {
    let days = (at - reference_new_moon()).num_milliseconds() as f64 / 86_400_000.0;
    let cycle = (days / SYNODIC_MONTH_DAYS).rem_euclid(1.0);
    let octant = ((cycle * 8.0).round() as usize) % 8;
    LunarInfo {
        phase: LunarPhase::ALL[octant],
        cycle,
        illumination: (1.0 - (cycle * std::f64::consts::TAU).cos()) / 2.0,
    }
}
