//! Current-conditions and forecast read paths.
//!
//! `current` serves the freshest available observation: a cached value inside
//! the staleness window is returned as-is; otherwise the provider is called
//! synchronously, the result persisted best-effort, and on provider failure
//! the stale cached value is served rather than failing the request. Only
//! when neither cache nor fetch succeeds does the caller see NotFound.
//!
//! `forecast` fetches the raw 3-hour feed and reduces it to daily summaries;
//! it has no dependency on persistence.

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;

use crate::db::models::{Observation, ObservationStats};
use crate::db::store::ObservationStore;
use crate::errors::AppError;
use crate::services::aggregate::{summarize_daily, DailySummary};
use crate::services::freshness::should_refetch;
use crate::services::openweather::WeatherProvider;

/// The upstream forecast feed has 3-hour resolution: eight samples per day.
const SAMPLES_PER_DAY: u32 = 8;

/// A multi-day forecast for one location.
#[derive(Debug, Clone)]
pub struct ForecastOverview {
    pub city: String,
    pub country: Option<String>,
    pub days: Vec<DailySummary>,
}

pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    store: Arc<dyn ObservationStore>,
    staleness: Duration,
}

impl WeatherService {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        store: Arc<dyn ObservationStore>,
        staleness: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            staleness,
        }
    }

    /// Freshest available current conditions for a city.
    pub async fn current(&self, city: &str) -> Result<Observation, AppError> {
        // A failing cache lookup degrades to "no cache"; it must not fail
        // the read on its own.
        let cached = self.store.latest(city).await.unwrap_or_else(|e| {
            tracing::warn!("cache lookup failed for {}: {}", city, e);
            None
        });

        if let Some(obs) = &cached {
            if !should_refetch(Some(obs), Utc::now(), self.staleness) {
                return Ok(obs.clone());
            }
        }

        match self.provider.fetch_current(city).await {
            Ok(fresh) => {
                // Persistence is best-effort: the fresh value is returned to
                // the caller even when the write fails.
                if let Err(e) = self.store.save(&fresh).await {
                    tracing::warn!("failed to persist observation for {}: {}", city, e);
                }
                Ok(fresh)
            }
            Err(e) => match cached {
                Some(stale) => {
                    tracing::warn!(
                        "provider unavailable for {}, serving stale observation: {}",
                        city,
                        e
                    );
                    Ok(stale)
                }
                None => {
                    tracing::warn!("no observation available for {}: {}", city, e);
                    Err(AppError::NotFound(format!(
                        "Weather data not found for {}",
                        city
                    )))
                }
            },
        }
    }

    /// Daily forecast summaries for the next `days` days (caller validates
    /// the [1,7] range).
    pub async fn forecast(&self, city: &str, days: u32) -> Result<ForecastOverview, AppError> {
        let feed = self
            .provider
            .fetch_forecast_samples(city, days * SAMPLES_PER_DAY)
            .await?;

        // "Today" in the target city's local time zone.
        let today = (Utc::now() + Duration::seconds(feed.utc_offset_secs as i64)).date_naive();
        let days = summarize_daily(&feed.samples, today, days as usize);

        if days.is_empty() {
            return Err(AppError::NotFound(format!(
                "No forecast available for {}",
                city
            )));
        }

        Ok(ForecastOverview {
            city: feed.city,
            country: feed.country,
            days,
        })
    }

    /// Stored observation history for a city, newest first.
    pub async fn history(&self, city: &str, limit: i64) -> Result<Vec<Observation>, AppError> {
        self.store.history(city, limit).await
    }

    /// Every city with stored observations.
    pub async fn cities(&self) -> Result<Vec<String>, AppError> {
        self.store.distinct_cities().await
    }

    /// Latest stored observation for each named city, fetched concurrently.
    /// Cities without data (or with failing lookups) are skipped.
    pub async fn latest_for_cities(&self, cities: &[String]) -> Vec<Observation> {
        let lookups = cities.iter().map(|city| self.store.latest(city));
        let results = join_all(lookups).await;

        let mut observations = Vec::new();
        for (city, result) in cities.iter().zip(results) {
            match result {
                Ok(Some(obs)) => observations.push(obs),
                Ok(None) => tracing::debug!("no stored observation for {}", city),
                Err(e) => tracing::warn!("latest-observation lookup failed for {}: {}", city, e),
            }
        }
        observations
    }

    /// Aggregate statistics for a city over the trailing `hours` window.
    pub async fn stats(&self, city: &str, hours: i64) -> Result<ObservationStats, AppError> {
        self.store.stats(city, hours).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "No data found for {} in the last {} hours",
                city, hours
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::openweather::{ForecastFeed, RawSample};
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveTime};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn test_observation(city: &str, captured_at: DateTime<Utc>) -> Observation {
        Observation {
            id: Uuid::new_v4(),
            city: city.to_string(),
            country: Some("HU".to_string()),
            temperature_c: 22.5,
            feels_like_c: Some(23.0),
            humidity_pct: 65,
            pressure_hpa: 1013,
            wind_speed_ms: 3.5,
            wind_direction_deg: Some(180),
            description: "felhős".to_string(),
            icon: "04d".to_string(),
            captured_at,
        }
    }

    struct StubProvider {
        fail: bool,
        samples: Vec<RawSample>,
        current_calls: AtomicUsize,
    }

    impl StubProvider {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                samples: Vec::new(),
                current_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WeatherProvider for StubProvider {
        async fn fetch_current(&self, city: &str) -> Result<Observation, AppError> {
            self.current_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Provider("unreachable".to_string()));
            }
            Ok(test_observation(city, Utc::now()))
        }

        async fn fetch_forecast_samples(
            &self,
            city: &str,
            _sample_count: u32,
        ) -> Result<ForecastFeed, AppError> {
            if self.fail {
                return Err(AppError::Provider("unreachable".to_string()));
            }
            Ok(ForecastFeed {
                city: city.to_string(),
                country: Some("HU".to_string()),
                utc_offset_secs: 0,
                samples: self.samples.clone(),
            })
        }
    }

    #[derive(Default)]
    struct StubStore {
        latest: Mutex<Option<Observation>>,
        saved: Mutex<Vec<Observation>>,
        fail_save: bool,
        fail_latest: bool,
    }

    #[async_trait]
    impl ObservationStore for StubStore {
        async fn save(&self, obs: &Observation) -> Result<(), AppError> {
            if self.fail_save {
                return Err(AppError::Database(sqlx::Error::PoolClosed));
            }
            self.saved.lock().unwrap().push(obs.clone());
            Ok(())
        }

        async fn latest(&self, _city: &str) -> Result<Option<Observation>, AppError> {
            if self.fail_latest {
                return Err(AppError::Database(sqlx::Error::PoolClosed));
            }
            Ok(self.latest.lock().unwrap().clone())
        }

        async fn history(&self, _city: &str, _limit: i64) -> Result<Vec<Observation>, AppError> {
            Ok(self.saved.lock().unwrap().clone())
        }

        async fn distinct_cities(&self) -> Result<Vec<String>, AppError> {
            Ok(vec!["Budapest".to_string()])
        }

        async fn stats(
            &self,
            _city: &str,
            _hours: i64,
        ) -> Result<Option<ObservationStats>, AppError> {
            Ok(None)
        }
    }

    fn service(provider: Arc<StubProvider>, store: Arc<StubStore>) -> WeatherService {
        WeatherService::new(provider, store, Duration::minutes(10))
    }

    #[tokio::test]
    async fn test_fresh_cache_is_served_without_provider_call() {
        let provider = Arc::new(StubProvider::new(false));
        let store = Arc::new(StubStore::default());
        let cached = test_observation("Budapest", Utc::now() - Duration::minutes(5));
        *store.latest.lock().unwrap() = Some(cached.clone());

        let result = service(provider.clone(), store.clone())
            .current("Budapest")
            .await
            .unwrap();

        assert_eq!(result.id, cached.id);
        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 0);
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_cache_triggers_refetch_and_persist() {
        let provider = Arc::new(StubProvider::new(false));
        let store = Arc::new(StubStore::default());
        let stale = test_observation("Budapest", Utc::now() - Duration::minutes(30));
        *store.latest.lock().unwrap() = Some(stale.clone());

        let result = service(provider.clone(), store.clone())
            .current("Budapest")
            .await
            .unwrap();

        assert_ne!(result.id, stale.id);
        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_refetch_falls_back_to_stale_cache() {
        let provider = Arc::new(StubProvider::new(true));
        let store = Arc::new(StubStore::default());
        let stale = test_observation("Budapest", Utc::now() - Duration::minutes(30));
        *store.latest.lock().unwrap() = Some(stale.clone());

        let result = service(provider, store)
            .current("Budapest")
            .await
            .unwrap();

        assert_eq!(result.id, stale.id);
    }

    #[tokio::test]
    async fn test_no_cache_and_failed_fetch_is_not_found() {
        let provider = Arc::new(StubProvider::new(true));
        let store = Arc::new(StubStore::default());

        let err = service(provider, store)
            .current("Budapest")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_save_failure_still_returns_fresh_observation() {
        let provider = Arc::new(StubProvider::new(false));
        let store = Arc::new(StubStore {
            fail_save: true,
            ..StubStore::default()
        });

        let result = service(provider, store).current("Budapest").await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cache_lookup_failure_degrades_to_fetch() {
        let provider = Arc::new(StubProvider::new(false));
        let store = Arc::new(StubStore {
            fail_latest: true,
            ..StubStore::default()
        });

        let result = service(provider.clone(), store).current("Budapest").await;

        assert!(result.is_ok());
        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forecast_summarizes_future_days() {
        let mut provider = StubProvider::new(false);
        let today = Utc::now().date_naive();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        provider.samples = vec![
            RawSample {
                timestamp: today.and_time(noon),
                temperature_c: 22.0,
                humidity_pct: 60,
                pressure_hpa: 1013,
                wind_speed_ms: 3.0,
                description: "felhős".to_string(),
                icon: "04d".to_string(),
                pop: 0.2,
            },
            RawSample {
                timestamp: (today + Duration::days(1)).and_time(noon),
                temperature_c: 24.0,
                humidity_pct: 55,
                pressure_hpa: 1015,
                wind_speed_ms: 2.0,
                description: "derült".to_string(),
                icon: "01d".to_string(),
                pop: 0.0,
            },
        ];
        let store = Arc::new(StubStore::default());

        let overview = service(Arc::new(provider), store)
            .forecast("Budapest", 7)
            .await
            .unwrap();

        assert_eq!(overview.city, "Budapest");
        assert_eq!(overview.days.len(), 2);
        assert_eq!(overview.days[0].date, today);
    }

    #[tokio::test]
    async fn test_forecast_with_no_summaries_is_not_found() {
        let provider = Arc::new(StubProvider::new(false));
        let store = Arc::new(StubStore::default());

        let err = service(provider, store)
            .forecast("Budapest", 7)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_latest_for_cities_skips_missing() {
        let provider = Arc::new(StubProvider::new(false));
        let store = Arc::new(StubStore::default());

        let result = service(provider, store)
            .latest_for_cities(&["Budapest".to_string(), "Szeged".to_string()])
            .await;

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_stats_without_data_is_not_found() {
        let provider = Arc::new(StubProvider::new(false));
        let store = Arc::new(StubStore::default());

        let err = service(provider, store)
            .stats("Budapest", 24)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }
}
