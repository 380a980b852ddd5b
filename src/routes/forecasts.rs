//! Forecast HTTP endpoint.
//!
//! - GET /api/v1/forecast?city=Budapest&days=7

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::AppState;
use crate::errors::AppError;
use crate::services::aggregate::DailySummary;
use crate::services::weather::ForecastOverview;

const FORECAST_DAYS_DEFAULT: u32 = 7;
const FORECAST_DAYS_MAX: u32 = 7;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ForecastQuery {
    /// City name, e.g. "Budapest"
    pub city: String,
    /// Number of days to summarise (1–7, default 7)
    pub days: Option<u32>,
}

/// Multi-day forecast for one city.
#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastResponse {
    pub city: String,
    pub country: Option<String>,
    pub forecasts: Vec<DailySummary>,
}

impl From<ForecastOverview> for ForecastResponse {
    fn from(overview: ForecastOverview) -> Self {
        Self {
            city: overview.city,
            country: overview.country,
            forecasts: overview.days,
        }
    }
}

/// Get a daily forecast summary for a city.
///
/// Fetches the upstream 3-hour feed and reduces it to one summary per local
/// calendar day, starting today.
#[utoipa::path(
    get,
    path = "/api/v1/forecast",
    tag = "Forecast",
    params(ForecastQuery),
    responses(
        (status = 200, description = "Daily forecast summaries", body = ForecastResponse),
        (status = 400, description = "Invalid days parameter", body = crate::errors::ErrorResponse),
        (status = 404, description = "No forecast available for the city", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_forecast(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<ForecastResponse>, AppError> {
    let days = query.days.unwrap_or(FORECAST_DAYS_DEFAULT);
    if !(1..=FORECAST_DAYS_MAX).contains(&days) {
        return Err(AppError::BadRequest(format!(
            "days must be between 1 and {}",
            FORECAST_DAYS_MAX
        )));
    }

    let overview = state.service.forecast(&query.city, days).await?;
    Ok(Json(overview.into()))
}
