use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A point-in-time weather observation for one location.
///
/// Immutable once created: one row per fetch, inserted append-only and
/// retained indefinitely as history. Created either by the ingestion
/// scheduler or by an on-demand fetch from the current-conditions read path.
#[derive(Debug, Clone, FromRow)]
pub struct Observation {
    pub id: Uuid,
    pub city: String,
    pub country: Option<String>,
    pub temperature_c: f64,
    pub feels_like_c: Option<f64>,
    pub humidity_pct: i32,
    pub pressure_hpa: i32,
    pub wind_speed_ms: f64,
    /// Wind direction in degrees (0 = north). Absent when the provider
    /// omits it for calm conditions.
    pub wind_direction_deg: Option<i32>,
    pub description: String,
    pub icon: String,
    pub captured_at: DateTime<Utc>,
}

/// Aggregate statistics over a trailing window of observations for one city.
#[derive(Debug, Clone)]
pub struct ObservationStats {
    pub record_count: i64,
    pub avg_temperature_c: f64,
    pub min_temperature_c: f64,
    pub max_temperature_c: f64,
    pub avg_humidity_pct: f64,
    pub last_update: Option<DateTime<Utc>>,
}
