//! Daily forecast aggregation.
//!
//! Buckets irregular 3-hour forecast samples into calendar-day summaries.
//! Samples are grouped by the local calendar date of their timestamp (the
//! provider has already shifted timestamps into local time); within a date,
//! a "day" bucket (local hour 9–18) and a "night" bucket (hour ≤ 6 or ≥ 21)
//! feed the day/night mean temperatures, while min/max, the remaining means
//! and the representative condition always draw from all of the date's
//! samples. Hours 7–8 and 19–20 belong to neither bucket.
//!
//! Pure: no I/O, deterministic for a given sample list and reference date.

use chrono::{NaiveDate, Timelike};
use serde::Serialize;
use utoipa::ToSchema;

use crate::helpers::{mean, round1, round2};
use crate::services::openweather::RawSample;

/// First local hour of the day bucket (inclusive).
const DAY_HOURS_START: u32 = 9;
/// Last local hour of the day bucket (inclusive).
const DAY_HOURS_END: u32 = 18;
/// Last local hour of the morning half of the night bucket (inclusive).
const NIGHT_HOURS_MORNING_END: u32 = 6;
/// First local hour of the evening half of the night bucket (inclusive).
const NIGHT_HOURS_EVENING_START: u32 = 21;

/// One day of forecast, summarised from that date's 3-hour samples.
/// Derived on every request, never persisted.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailySummary {
    /// Local calendar date
    pub date: NaiveDate,
    /// Mean temperature of the day bucket (°C)
    pub day_temp_c: f64,
    /// Mean temperature of the night bucket (°C)
    pub night_temp_c: f64,
    /// Minimum temperature over all of the date's samples (°C)
    pub min_temp_c: f64,
    /// Maximum temperature over all of the date's samples (°C)
    pub max_temp_c: f64,
    /// Mean humidity, rounded to the nearest percent
    pub humidity_pct: i32,
    /// Mean pressure, rounded to the nearest hPa
    pub pressure_hpa: i32,
    /// Mean wind speed, one decimal (m/s)
    pub wind_speed_ms: f64,
    /// Most frequent condition description among the date's samples
    pub description: String,
    /// Most frequent condition icon among the date's samples
    pub icon: String,
    /// Highest precipitation probability of the date, as a percentage
    pub pop_pct: u8,
}

/// Summarise raw 3-hour samples into at most `max_days` daily summaries.
///
/// Dates strictly before `today` are discarded; the result is sorted
/// ascending by date with no duplicates. Empty input yields an empty result.
pub fn summarize_daily(
    samples: &[RawSample],
    today: NaiveDate,
    max_days: usize,
) -> Vec<DailySummary> {
    let mut by_date: std::collections::BTreeMap<NaiveDate, Vec<&RawSample>> =
        std::collections::BTreeMap::new();
    for sample in samples {
        by_date
            .entry(sample.timestamp.date())
            .or_default()
            .push(sample);
    }

    by_date
        .into_iter()
        .filter(|(date, _)| *date >= today)
        .take(max_days)
        .map(|(date, group)| summarize_date(date, &group))
        .collect()
}

/// Summarise one date's samples. `group` is never empty and preserves the
/// original sample iteration order (relevant for the mode tie-break).
fn summarize_date(date: NaiveDate, group: &[&RawSample]) -> DailySummary {
    let temps: Vec<f64> = group.iter().map(|s| s.temperature_c).collect();
    let all_mean = mean(&temps);

    let day_temps: Vec<f64> = group
        .iter()
        .filter(|s| {
            let hour = s.timestamp.hour();
            (DAY_HOURS_START..=DAY_HOURS_END).contains(&hour)
        })
        .map(|s| s.temperature_c)
        .collect();
    let night_temps: Vec<f64> = group
        .iter()
        .filter(|s| {
            let hour = s.timestamp.hour();
            hour <= NIGHT_HOURS_MORNING_END || hour >= NIGHT_HOURS_EVENING_START
        })
        .map(|s| s.temperature_c)
        .collect();

    // An empty bucket falls back to the whole date's mean rather than
    // omitting the field.
    let day_temp = if day_temps.is_empty() {
        all_mean
    } else {
        mean(&day_temps)
    };
    let night_temp = if night_temps.is_empty() {
        all_mean
    } else {
        mean(&night_temps)
    };

    let min_temp = temps.iter().copied().fold(f64::INFINITY, f64::min);
    let max_temp = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let humidity = mean(&group.iter().map(|s| s.humidity_pct as f64).collect::<Vec<_>>());
    let pressure = mean(&group.iter().map(|s| s.pressure_hpa as f64).collect::<Vec<_>>());
    let wind = mean(&group.iter().map(|s| s.wind_speed_ms).collect::<Vec<_>>());

    let max_pop = group.iter().map(|s| s.pop).fold(0.0, f64::max);

    DailySummary {
        date,
        day_temp_c: round2(day_temp),
        night_temp_c: round2(night_temp),
        min_temp_c: min_temp,
        max_temp_c: max_temp,
        humidity_pct: humidity.round() as i32,
        pressure_hpa: pressure.round() as i32,
        wind_speed_ms: round1(wind),
        description: most_frequent(group.iter().map(|s| s.description.as_str())),
        icon: most_frequent(group.iter().map(|s| s.icon.as_str())),
        pop_pct: (max_pop * 100.0).round() as u8,
    }
}

/// Most frequent value; ties broken by first encounter in iteration order.
fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for &(value, count) in &counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string()).unwrap_or_default()
}
