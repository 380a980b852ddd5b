pub mod forecasts;
pub mod health;
pub mod scheduler;
pub mod weather;

use std::sync::Arc;

use crate::services::scheduler::IngestionScheduler;
use crate::services::weather::WeatherService;

/// Shared application state for the weather, forecast and scheduler endpoints.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WeatherService>,
    pub scheduler: IngestionScheduler,
}
