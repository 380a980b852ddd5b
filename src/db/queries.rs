use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::Observation;

/// Insert a new observation row. Rows are append-only; nothing is updated.
pub async fn insert_observation(pool: &PgPool, obs: &Observation) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO observations
            (id, city, country, temperature_c, feels_like_c, humidity_pct,
             pressure_hpa, wind_speed_ms, wind_direction_deg, description,
             icon, captured_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(obs.id)
    .bind(&obs.city)
    .bind(&obs.country)
    .bind(obs.temperature_c)
    .bind(obs.feels_like_c)
    .bind(obs.humidity_pct)
    .bind(obs.pressure_hpa)
    .bind(obs.wind_speed_ms)
    .bind(obs.wind_direction_deg)
    .bind(&obs.description)
    .bind(&obs.icon)
    .bind(obs.captured_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the most recent observation for a city, if any.
pub async fn latest_observation(
    pool: &PgPool,
    city: &str,
) -> Result<Option<Observation>, sqlx::Error> {
    sqlx::query_as::<_, Observation>(
        "SELECT id, city, country, temperature_c, feels_like_c, humidity_pct,
                pressure_hpa, wind_speed_ms, wind_direction_deg, description,
                icon, captured_at
         FROM observations
         WHERE city = $1
         ORDER BY captured_at DESC
         LIMIT 1",
    )
    .bind(city)
    .fetch_optional(pool)
    .await
}

/// Get the observation history for a city, newest first.
pub async fn observation_history(
    pool: &PgPool,
    city: &str,
    limit: i64,
) -> Result<Vec<Observation>, sqlx::Error> {
    sqlx::query_as::<_, Observation>(
        "SELECT id, city, country, temperature_c, feels_like_c, humidity_pct,
                pressure_hpa, wind_speed_ms, wind_direction_deg, description,
                icon, captured_at
         FROM observations
         WHERE city = $1
         ORDER BY captured_at DESC
         LIMIT $2",
    )
    .bind(city)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// List every city that has at least one stored observation.
pub async fn distinct_cities(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT DISTINCT city FROM observations ORDER BY city")
        .fetch_all(pool)
        .await
}

/// One row of aggregate statistics. Aggregates are NULL when no rows match.
#[derive(Debug, sqlx::FromRow)]
pub struct StatsRow {
    pub record_count: i64,
    pub avg_temperature_c: Option<f64>,
    pub min_temperature_c: Option<f64>,
    pub max_temperature_c: Option<f64>,
    pub avg_humidity_pct: Option<f64>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Aggregate temperature/humidity statistics for a city since `cutoff`.
pub async fn observation_stats(
    pool: &PgPool,
    city: &str,
    cutoff: DateTime<Utc>,
) -> Result<StatsRow, sqlx::Error> {
    sqlx::query_as::<_, StatsRow>(
        "SELECT COUNT(*) AS record_count,
                AVG(temperature_c) AS avg_temperature_c,
                MIN(temperature_c) AS min_temperature_c,
                MAX(temperature_c) AS max_temperature_c,
                AVG(humidity_pct::float8) AS avg_humidity_pct,
                MAX(captured_at) AS last_update
         FROM observations
         WHERE city = $1 AND captured_at >= $2",
    )
    .bind(city)
    .bind(cutoff)
    .fetch_one(pool)
    .await
}
