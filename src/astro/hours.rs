//! Planetary hours.
//!
//! Daylight (sunrise to sunset) and night (sunset to next sunrise) are each
//! split into twelve unequal hours. The first hour after sunrise belongs to
//! the ruler of the weekday; each following hour steps down the Chaldean order.
//! Sunrise and sunset come from a low-precision solar model (declination,
//! equation of time, 0.833° refraction), good to a few minutes.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::Serialize;

use super::Planet;
use crate::model::GeoLocation;

/// Slowest to fastest.
pub const CHALDEAN_ORDER: [Planet; 7] = [
    Planet::Saturn,
    Planet::Jupiter,
    Planet::Mars,
    Planet::Sun,
    Planet::Venus,
    Planet::Mercury,
    Planet::Moon,
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlanetaryHour {
    pub ruler: Planet,
    /// Ruler of the planetary day, which starts at sunrise.
    pub day_ruler: Planet,
    /// `0..24`, counted from sunrise; `12..24` are night hours.
    pub index: u8,
}

impl PlanetaryHour {
    pub fn is_daytime(&self) -> bool {
        self.index < 12
    }
}

pub fn day_ruler(weekday: Weekday) -> Planet {
    match weekday {
        Weekday::Sun => Planet::Sun,
        Weekday::Mon => Planet::Moon,
        Weekday::Tue => Planet::Mars,
        Weekday::Wed => Planet::Mercury,
        Weekday::Thu => Planet::Jupiter,
        Weekday::Fri => Planet::Venus,
        Weekday::Sat => Planet::Saturn,
    }
}

fn hour_ruler(day_ruler: Planet, index: u8) -> Planet {
    let start = CHALDEAN_ORDER
        .iter()
        .position(|p| *p == day_ruler)
        .unwrap_or(0);
    CHALDEAN_ORDER[(start + index as usize) % 7]
}

/// Sunrise and sunset (UTC) for the local civil `date` at `location`.
/// `None` during polar day or polar night.
pub fn sun_times(date: NaiveDate, location: GeoLocation) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let n = date.ordinal() as f64;
    let declination = (-23.44f64).to_radians() * ((360.0 / 365.0) * (n + 10.0)).to_radians().cos();
    let b = ((360.0 / 365.0) * (n - 81.0)).to_radians();
    let eot_minutes = 9.87 * (2.0 * b).sin() - 7.53 * b.cos() - 1.5 * b.sin();

    let lat = location.latitude.to_radians();
    let cos_h = ((-0.833f64).to_radians().sin() - lat.sin() * declination.sin())
        / (lat.cos() * declination.cos());
    if !cos_h.is_finite() || !(-1.0..=1.0).contains(&cos_h) {
        return None;
    }
    let half_day_minutes = 4.0 * cos_h.acos().to_degrees();
    let noon_minutes = 720.0 - 4.0 * location.longitude - eot_minutes;

    let midnight = date.and_hms_opt(0, 0, 0)?.and_utc();
    let at = |minutes: f64| midnight + Duration::milliseconds((minutes * 60_000.0).round() as i64);
    Some((at(noon_minutes - half_day_minutes), at(noon_minutes + half_day_minutes)))
}

/// Planetary hour in effect at `at`, or `None` where the Sun does not rise
/// or set that day.
pub fn planetary_hour(at: DateTime<Utc>, location: GeoLocation) -> Option<PlanetaryHour> {
    // Local mean solar date.
    let offset = Duration::milliseconds((location.longitude / 15.0 * 3_600_000.0) as i64);
    let today = (at + offset).date_naive();
    let (rise, set) = sun_times(today, location)?;

    let (day, start, end, first) = if at < rise {
        let yesterday = today.pred_opt()?;
        let (_, prev_set) = sun_times(yesterday, location)?;
        (yesterday, prev_set, rise, 12)
    } else if at < set {
        (today, rise, set, 0)
    } else {
        let (next_rise, _) = sun_times(today.succ_opt()?, location)?;
        (today, set, next_rise, 12)
    };

    let span = (end - start).num_milliseconds().max(1) as f64;
    let into = (at - start).num_milliseconds().max(0) as f64;
    let step = ((into / span * 12.0).floor() as u8).min(11);
    let index = first + step;

    let day_ruler = day_ruler(day.weekday());
    Some(PlanetaryHour {
        ruler: hour_ruler(day_ruler, index),
        day_ruler,
        index,
    })
}
