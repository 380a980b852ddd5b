// Weather Dashboard API v0.1
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use db::store::PgObservationStore;
use routes::AppState;
use services::openweather::OpenWeatherClient;
use services::scheduler::IngestionScheduler;
use services::weather::WeatherService;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

/// Weather Dashboard API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Dashboard API",
        version = "0.1.0",
        description = "Weather dashboard backend. Periodically collects observations \
            from OpenWeatherMap for a configured set of cities, persists them as \
            history, serves freshness-cached current conditions, and summarises the \
            3-hour forecast feed into daily day/night overviews.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Weather", description = "Current conditions, history and statistics"),
        (name = "Forecast", description = "Daily forecast summaries"),
        (name = "Scheduler", description = "Background ingestion scheduler"),
    ),
    paths(
        routes::health::health_check,
        routes::weather::get_current,
        routes::weather::get_history,
        routes::weather::get_cities,
        routes::weather::get_multiple,
        routes::weather::get_stats,
        routes::forecasts::get_forecast,
        routes::scheduler::refresh,
        routes::scheduler::status,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::weather::ObservationResponse,
            routes::weather::CitiesResponse,
            routes::weather::MultiCityResponse,
            routes::weather::StatsResponse,
            routes::forecasts::ForecastResponse,
            services::aggregate::DailySummary,
            routes::scheduler::RefreshResponse,
            services::scheduler::RunState,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_dashboard_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Provider, store and core services
    let provider = Arc::new(OpenWeatherClient::new(
        &config.openweather_base_url,
        &config.openweather_api_key,
        &config.language,
    ));
    let store = Arc::new(PgObservationStore::new(pool.clone()));

    let service = Arc::new(WeatherService::new(
        provider.clone(),
        store.clone(),
        chrono::Duration::minutes(config.staleness_minutes as i64),
    ));
    let scheduler = IngestionScheduler::new(provider, store, config.cities.clone());

    // Start periodic ingestion. The first cycle runs before serving so the
    // configured cities have data on the very first request.
    scheduler
        .start(std::time::Duration::from_secs(
            config.schedule_interval_minutes * 60,
        ))
        .await;

    let app_state = AppState {
        service,
        scheduler: scheduler.clone(),
    };

    // CORS — browser dashboard reads GET endpoints and POSTs manual refreshes
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    // Build router
    // Weather/forecast/scheduler routes share AppState; health uses the pool.
    let api_routes = Router::new()
        .route("/api/v1/weather/current", get(routes::weather::get_current))
        .route("/api/v1/weather/history", get(routes::weather::get_history))
        .route("/api/v1/weather/cities", get(routes::weather::get_cities))
        .route(
            "/api/v1/weather/multiple",
            get(routes::weather::get_multiple),
        )
        .route("/api/v1/weather/stats", get(routes::weather::get_stats))
        .route("/api/v1/forecast", get(routes::forecasts::get_forecast))
        .route(
            "/api/v1/scheduler/refresh",
            post(routes::scheduler::refresh),
        )
        .route("/api/v1/scheduler/status", get(routes::scheduler::status))
        .with_state(app_state);

    let health_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(pool);

    let app = Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown(scheduler))
        .await
        .expect("Server terminated unexpectedly");
}

/// Wait for ctrl-c, then stop the scheduler so no further writes happen
/// after the server winds down.
async fn shutdown(scheduler: IngestionScheduler) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("shutdown signal received");
    scheduler.stop().await;
}
