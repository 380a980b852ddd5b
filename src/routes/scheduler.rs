//! Ingestion scheduler HTTP endpoints.
//!
//! - POST /api/v1/scheduler/refresh — run one ingestion cycle now
//! - GET  /api/v1/scheduler/status  — current scheduler run state

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::services::scheduler::RunState;

/// Outcome of a manually triggered ingestion cycle.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub message: String,
    /// Locations successfully fetched and stored
    pub succeeded: usize,
    /// Locations attempted
    pub total: usize,
}

/// Trigger one ingestion cycle immediately.
///
/// Works whether or not the periodic scheduler is running. If a cycle is
/// already in flight, this waits for it to finish before running; two cycles
/// never overlap.
#[utoipa::path(
    post,
    path = "/api/v1/scheduler/refresh",
    tag = "Scheduler",
    responses(
        (status = 200, description = "Cycle completed", body = RefreshResponse),
    )
)]
pub async fn refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let outcome = state.scheduler.manual_refresh().await;
    Json(RefreshResponse {
        message: "Weather data refresh completed".to_string(),
        succeeded: outcome.succeeded,
        total: outcome.total,
    })
}

/// Get the current scheduler status.
///
/// Reports whether the periodic loop is running, its interval, and the
/// success/total counts of the most recent ingestion cycle.
#[utoipa::path(
    get,
    path = "/api/v1/scheduler/status",
    tag = "Scheduler",
    responses(
        (status = 200, description = "Current scheduler state", body = RunState),
    )
)]
pub async fn status(State(state): State<AppState>) -> Json<RunState> {
    Json(state.scheduler.status().await)
}
