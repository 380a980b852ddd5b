//! Observation persistence seam.
//!
//! The scheduler and the read paths depend on this trait rather than on a
//! concrete pool so they can be exercised with in-memory fakes. The Postgres
//! implementation is a thin delegation to `db::queries`.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;

use super::models::{Observation, ObservationStats};
use super::queries;
use crate::errors::AppError;
use crate::helpers::round1;

/// Persistence operations the core needs. Implementations must be safe for
/// concurrent saves from the ingestion cycle and concurrent reads from the
/// request-handling paths.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Persist one observation (append-only).
    async fn save(&self, obs: &Observation) -> Result<(), AppError>;

    /// Most recent observation for a city; `None` when nothing is stored yet.
    async fn latest(&self, city: &str) -> Result<Option<Observation>, AppError>;

    /// Observation history for a city, newest first.
    async fn history(&self, city: &str, limit: i64) -> Result<Vec<Observation>, AppError>;

    /// Every city with at least one stored observation.
    async fn distinct_cities(&self) -> Result<Vec<String>, AppError>;

    /// Aggregate statistics over the trailing `hours` window; `None` when the
    /// window contains no observations.
    async fn stats(&self, city: &str, hours: i64) -> Result<Option<ObservationStats>, AppError>;
}

/// Postgres-backed observation store.
#[derive(Clone)]
pub struct PgObservationStore {
    pool: PgPool,
}

impl PgObservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ObservationStore for PgObservationStore {
    async fn save(&self, obs: &Observation) -> Result<(), AppError> {
        queries::insert_observation(&self.pool, obs).await?;
        Ok(())
    }

    async fn latest(&self, city: &str) -> Result<Option<Observation>, AppError> {
        Ok(queries::latest_observation(&self.pool, city).await?)
    }

    async fn history(&self, city: &str, limit: i64) -> Result<Vec<Observation>, AppError> {
        Ok(queries::observation_history(&self.pool, city, limit).await?)
    }

    async fn distinct_cities(&self) -> Result<Vec<String>, AppError> {
        Ok(queries::distinct_cities(&self.pool).await?)
    }

    async fn stats(&self, city: &str, hours: i64) -> Result<Option<ObservationStats>, AppError> {
        let cutoff = Utc::now() - Duration::hours(hours);
        let row = queries::observation_stats(&self.pool, city, cutoff).await?;

        if row.record_count == 0 {
            return Ok(None);
        }

        Ok(Some(ObservationStats {
            record_count: row.record_count,
            avg_temperature_c: round1(row.avg_temperature_c.unwrap_or_default()),
            min_temperature_c: row.min_temperature_c.unwrap_or_default(),
            max_temperature_c: row.max_temperature_c.unwrap_or_default(),
            avg_humidity_pct: round1(row.avg_humidity_pct.unwrap_or_default()),
            last_update: row.last_update,
        }))
    }
}
