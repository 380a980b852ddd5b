//! Current-conditions HTTP endpoints.
//!
//! - GET /api/v1/weather/current?city=Budapest
//! - GET /api/v1/weather/history?city=Budapest&limit=10
//! - GET /api/v1/weather/cities
//! - GET /api/v1/weather/multiple?cities=Budapest,Szeged
//! - GET /api/v1/weather/stats?city=Budapest&hours=24

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::AppState;
use crate::db::models::{Observation, ObservationStats};
use crate::errors::AppError;

const HISTORY_LIMIT_DEFAULT: i64 = 10;
const HISTORY_LIMIT_MAX: i64 = 100;
const STATS_HOURS_DEFAULT: i64 = 24;
const STATS_HOURS_MAX: i64 = 720;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct CityQuery {
    /// City name, e.g. "Budapest"
    pub city: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// City name, e.g. "Budapest"
    pub city: String,
    /// Number of observations to return, newest first (1–100, default 10)
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MultiCityQuery {
    /// Comma-separated city names, e.g. "Budapest,Szeged"
    pub cities: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatsQuery {
    /// City name, e.g. "Budapest"
    pub city: String,
    /// Trailing window in hours (1–720, default 24)
    pub hours: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// One stored or freshly fetched observation.
#[derive(Debug, Serialize, ToSchema)]
pub struct ObservationResponse {
    pub id: Uuid,
    pub city: String,
    pub country: Option<String>,
    /// Air temperature in Celsius
    pub temperature_c: f64,
    /// Feels-like temperature in Celsius
    pub feels_like_c: Option<f64>,
    /// Relative humidity percentage
    pub humidity_pct: i32,
    /// Air pressure in hPa
    pub pressure_hpa: i32,
    /// Wind speed in metres per second
    pub wind_speed_ms: f64,
    /// Wind direction in degrees (0 = north)
    pub wind_direction_deg: Option<i32>,
    /// Condition description in the configured language
    pub description: String,
    /// Provider icon code (e.g. "04d")
    pub icon: String,
    pub captured_at: DateTime<Utc>,
}

impl From<Observation> for ObservationResponse {
    fn from(obs: Observation) -> Self {
        Self {
            id: obs.id,
            city: obs.city,
            country: obs.country,
            temperature_c: obs.temperature_c,
            feels_like_c: obs.feels_like_c,
            humidity_pct: obs.humidity_pct,
            pressure_hpa: obs.pressure_hpa,
            wind_speed_ms: obs.wind_speed_ms,
            wind_direction_deg: obs.wind_direction_deg,
            description: obs.description,
            icon: obs.icon,
            captured_at: obs.captured_at,
        }
    }
}

/// Cities with at least one stored observation.
#[derive(Debug, Serialize, ToSchema)]
pub struct CitiesResponse {
    pub cities: Vec<String>,
}

/// Latest observation for each requested city.
#[derive(Debug, Serialize, ToSchema)]
pub struct MultiCityResponse {
    pub cities: Vec<ObservationResponse>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate statistics for one city over a trailing window.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub city: String,
    pub avg_temperature_c: f64,
    pub min_temperature_c: f64,
    pub max_temperature_c: f64,
    pub avg_humidity_pct: f64,
    pub record_count: i64,
    pub last_update: Option<DateTime<Utc>>,
}

impl StatsResponse {
    fn new(city: String, stats: ObservationStats) -> Self {
        Self {
            city,
            avg_temperature_c: stats.avg_temperature_c,
            min_temperature_c: stats.min_temperature_c,
            max_temperature_c: stats.max_temperature_c,
            avg_humidity_pct: stats.avg_humidity_pct,
            record_count: stats.record_count,
            last_update: stats.last_update,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Get the freshest available current conditions for a city.
///
/// Serves the cached observation while it is inside the staleness window,
/// refetches from the provider otherwise, and falls back to the stale cache
/// when the provider is unreachable.
#[utoipa::path(
    get,
    path = "/api/v1/weather/current",
    tag = "Weather",
    params(CityQuery),
    responses(
        (status = 200, description = "Current conditions", body = ObservationResponse),
        (status = 404, description = "No data available for the city", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_current(
    State(state): State<AppState>,
    Query(query): Query<CityQuery>,
) -> Result<Json<ObservationResponse>, AppError> {
    let observation = state.service.current(&query.city).await?;
    Ok(Json(observation.into()))
}

/// Get the stored observation history for a city, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/weather/history",
    tag = "Weather",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Observation history", body = [ObservationResponse]),
        (status = 400, description = "Invalid limit", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ObservationResponse>>, AppError> {
    let limit = query.limit.unwrap_or(HISTORY_LIMIT_DEFAULT);
    if !(1..=HISTORY_LIMIT_MAX).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            HISTORY_LIMIT_MAX
        )));
    }

    let history = state.service.history(&query.city, limit).await?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}

/// List every city with stored observations.
#[utoipa::path(
    get,
    path = "/api/v1/weather/cities",
    tag = "Weather",
    responses(
        (status = 200, description = "Known cities", body = CitiesResponse),
    )
)]
pub async fn get_cities(
    State(state): State<AppState>,
) -> Result<Json<CitiesResponse>, AppError> {
    let cities = state.service.cities().await?;
    Ok(Json(CitiesResponse { cities }))
}

/// Get the latest stored observation for several cities at once.
///
/// Cities without stored data are silently skipped.
#[utoipa::path(
    get,
    path = "/api/v1/weather/multiple",
    tag = "Weather",
    params(MultiCityQuery),
    responses(
        (status = 200, description = "Latest observation per city", body = MultiCityResponse),
        (status = 400, description = "Empty city list", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_multiple(
    State(state): State<AppState>,
    Query(query): Query<MultiCityQuery>,
) -> Result<Json<MultiCityResponse>, AppError> {
    let cities = parse_city_list(&query.cities)?;
    let observations = state.service.latest_for_cities(&cities).await;

    Ok(Json(MultiCityResponse {
        cities: observations.into_iter().map(Into::into).collect(),
        timestamp: Utc::now(),
    }))
}

/// Get aggregate temperature/humidity statistics for a city.
#[utoipa::path(
    get,
    path = "/api/v1/weather/stats",
    tag = "Weather",
    params(StatsQuery),
    responses(
        (status = 200, description = "Statistics over the trailing window", body = StatsResponse),
        (status = 404, description = "No data in the window", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let hours = query.hours.unwrap_or(STATS_HOURS_DEFAULT);
    if !(1..=STATS_HOURS_MAX).contains(&hours) {
        return Err(AppError::BadRequest(format!(
            "hours must be between 1 and {}",
            STATS_HOURS_MAX
        )));
    }

    let stats = state.service.stats(&query.city, hours).await?;
    Ok(Json(StatsResponse::new(query.city, stats)))
}

/// Split a comma-separated city list, rejecting an effectively empty one.
fn parse_city_list(raw: &str) -> Result<Vec<String>, AppError> {
    let cities: Vec<String> = raw
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    if cities.is_empty() {
        return Err(AppError::BadRequest(
            "cities must contain at least one city name".to_string(),
        ));
    }
    Ok(cities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_city_list_trims_and_skips_empty_entries() {
        let cities = parse_city_list(" Budapest , ,Szeged,").unwrap();
        assert_eq!(cities, vec!["Budapest", "Szeged"]);
    }

    #[test]
    fn test_parse_city_list_rejects_empty_input() {
        assert!(parse_city_list("").is_err());
        assert!(parse_city_list(" , ,").is_err());
    }
}
