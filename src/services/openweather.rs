//! OpenWeatherMap client.
//!
//! Fetches current conditions (`/weather`) and the 3-hour-resolution forecast
//! feed (`/forecast`) for a named city.
//! See: https://openweathermap.org/api
//!
//! The upstream payload is parsed into typed structs and validated once at
//! this boundary; temperatures are converted from Kelvin to Celsius here, and
//! forecast timestamps are shifted into the city's local time zone so the
//! aggregation code can bucket by local calendar date without any further
//! conversion.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::Observation;
use crate::errors::AppError;
use crate::helpers::celsius_from_kelvin;

/// Timeout applied to every upstream request. A timed-out call is treated
/// identically to any other fetch failure.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Source of weather data for a named location.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch the current conditions for a city as a ready-to-store observation.
    async fn fetch_current(&self, city: &str) -> Result<Observation, AppError>;

    /// Fetch up to `sample_count` raw 3-hour forecast points for a city.
    async fn fetch_forecast_samples(
        &self,
        city: &str,
        sample_count: u32,
    ) -> Result<ForecastFeed, AppError>;
}

/// One upstream 3-hour forecast point, already shifted to local time.
/// Transient: exists only for the duration of a forecast aggregation call.
#[derive(Debug, Clone)]
pub struct RawSample {
    /// Timestamp in the target city's local time zone.
    pub timestamp: NaiveDateTime,
    pub temperature_c: f64,
    pub humidity_pct: i32,
    pub pressure_hpa: i32,
    pub wind_speed_ms: f64,
    pub description: String,
    pub icon: String,
    /// Precipitation probability in [0, 1].
    pub pop: f64,
}

/// A batch of forecast samples plus the location metadata shared by all of
/// them. `utc_offset_secs` lets the read path compute the local reference
/// date ("today") for the aggregation.
#[derive(Debug, Clone)]
pub struct ForecastFeed {
    pub city: String,
    pub country: Option<String>,
    pub utc_offset_secs: i32,
    pub samples: Vec<RawSample>,
}

// --- OpenWeatherMap JSON response types ---

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    name: String,
    sys: SysSection,
    main: MainSection,
    wind: WindSection,
    weather: Vec<ConditionSection>,
}

#[derive(Debug, Deserialize)]
struct SysSection {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MainSection {
    /// Kelvin.
    temp: f64,
    /// Kelvin.
    feels_like: Option<f64>,
    humidity: i32,
    pressure: i32,
}

#[derive(Debug, Deserialize)]
struct WindSection {
    speed: f64,
    deg: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ConditionSection {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    city: CitySection,
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct CitySection {
    name: String,
    country: Option<String>,
    /// Shift from UTC in seconds.
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    /// Unix timestamp, UTC.
    dt: i64,
    main: MainSection,
    wind: WindSection,
    weather: Vec<ConditionSection>,
    #[serde(default)]
    pop: f64,
}

/// Client for the OpenWeatherMap 2.5 API.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
}

impl OpenWeatherClient {
    pub fn new(base_url: &str, api_key: &str, language: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            language: language.to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        city: &str,
        extra: &[(&str, String)],
    ) -> Result<T, AppError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut params: Vec<(&str, String)> = vec![
            ("q", city.to_string()),
            ("appid", self.api_key.clone()),
            ("lang", self.language.clone()),
        ];
        params.extend_from_slice(extra);

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("OpenWeatherMap request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Unknown location: {}", city)));
        }
        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "OpenWeatherMap returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Provider(format!("OpenWeatherMap payload error: {}", e)))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch_current(&self, city: &str) -> Result<Observation, AppError> {
        tracing::debug!("fetching current conditions for {}", city);
        let response: CurrentResponse = self.get_json("weather", city, &[]).await?;
        observation_from_current(response)
    }

    async fn fetch_forecast_samples(
        &self,
        city: &str,
        sample_count: u32,
    ) -> Result<ForecastFeed, AppError> {
        tracing::debug!("fetching {} forecast samples for {}", sample_count, city);
        let response: ForecastResponse = self
            .get_json("forecast", city, &[("cnt", sample_count.to_string())])
            .await?;
        feed_from_forecast(response)
    }
}

/// Convert a validated `/weather` payload into an `Observation`.
///
/// Pure function (no I/O); the observation is stamped with a fresh id and
/// the capture time.
fn observation_from_current(response: CurrentResponse) -> Result<Observation, AppError> {
    let condition = response
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Provider("response missing condition block".to_string()))?;

    Ok(Observation {
        id: Uuid::new_v4(),
        city: response.name,
        country: response.sys.country,
        temperature_c: celsius_from_kelvin(response.main.temp),
        feels_like_c: response.main.feels_like.map(celsius_from_kelvin),
        humidity_pct: response.main.humidity,
        pressure_hpa: response.main.pressure,
        wind_speed_ms: response.wind.speed,
        wind_direction_deg: response.wind.deg,
        description: condition.description,
        icon: condition.icon,
        captured_at: Utc::now(),
    })
}

/// Convert a validated `/forecast` payload into a `ForecastFeed`, shifting
/// every sample timestamp into the city's local time zone.
fn feed_from_forecast(response: ForecastResponse) -> Result<ForecastFeed, AppError> {
    let offset = Duration::seconds(response.city.timezone as i64);
    let mut samples = Vec::with_capacity(response.list.len());

    for entry in response.list {
        let utc = DateTime::<Utc>::from_timestamp(entry.dt, 0).ok_or_else(|| {
            AppError::Provider(format!("forecast entry has invalid timestamp {}", entry.dt))
        })?;
        let condition = entry.weather.into_iter().next().ok_or_else(|| {
            AppError::Provider("forecast entry missing condition block".to_string())
        })?;

        samples.push(RawSample {
            timestamp: (utc + offset).naive_utc(),
            temperature_c: celsius_from_kelvin(entry.main.temp),
            humidity_pct: entry.main.humidity,
            pressure_hpa: entry.main.pressure,
            wind_speed_ms: entry.wind.speed,
            description: condition.description,
            icon: condition.icon,
            pop: entry.pop,
        });
    }

    Ok(ForecastFeed {
        city: response.city.name,
        country: response.city.country,
        utc_offset_secs: response.city.timezone,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn current_payload() -> serde_json::Value {
        serde_json::json!({
            "name": "Budapest",
            "sys": { "country": "HU" },
            "main": { "temp": 295.65, "feels_like": 296.15, "humidity": 65, "pressure": 1013 },
            "wind": { "speed": 3.5, "deg": 180 },
            "weather": [ { "description": "felhős", "icon": "04d" } ]
        })
    }

    #[test]
    fn test_observation_from_current() {
        let response: CurrentResponse = serde_json::from_value(current_payload()).unwrap();
        let obs = observation_from_current(response).unwrap();

        assert_eq!(obs.city, "Budapest");
        assert_eq!(obs.country.as_deref(), Some("HU"));
        assert_eq!(obs.temperature_c, 22.5);
        assert_eq!(obs.feels_like_c, Some(23.0));
        assert_eq!(obs.humidity_pct, 65);
        assert_eq!(obs.pressure_hpa, 1013);
        assert_eq!(obs.wind_speed_ms, 3.5);
        assert_eq!(obs.wind_direction_deg, Some(180));
        assert_eq!(obs.description, "felhős");
        assert_eq!(obs.icon, "04d");
    }

    #[test]
    fn test_observation_from_current_optional_fields_absent() {
        let payload = serde_json::json!({
            "name": "Budapest",
            "sys": {},
            "main": { "temp": 273.15, "humidity": 80, "pressure": 1000 },
            "wind": { "speed": 0.5 },
            "weather": [ { "description": "köd", "icon": "50d" } ]
        });
        let response: CurrentResponse = serde_json::from_value(payload).unwrap();
        let obs = observation_from_current(response).unwrap();

        assert_eq!(obs.country, None);
        assert_eq!(obs.feels_like_c, None);
        assert_eq!(obs.wind_direction_deg, None);
        assert_eq!(obs.temperature_c, 0.0);
    }

    #[test]
    fn test_observation_from_current_missing_condition_is_provider_error() {
        let payload = serde_json::json!({
            "name": "Budapest",
            "sys": { "country": "HU" },
            "main": { "temp": 295.65, "humidity": 65, "pressure": 1013 },
            "wind": { "speed": 3.5 },
            "weather": []
        });
        let response: CurrentResponse = serde_json::from_value(payload).unwrap();
        let err = observation_from_current(response).unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }

    #[test]
    fn test_feed_from_forecast_shifts_to_local_time() {
        let payload = serde_json::json!({
            "city": { "name": "Budapest", "country": "HU", "timezone": 7200 },
            "list": [
                {
                    // 2024-06-10T07:00:00Z == 09:00 local at UTC+2
                    "dt": 1718002800,
                    "main": { "temp": 295.15, "humidity": 60, "pressure": 1015 },
                    "wind": { "speed": 2.0 },
                    "weather": [ { "description": "derült", "icon": "01d" } ],
                    "pop": 0.25
                }
            ]
        });
        let response: ForecastResponse = serde_json::from_value(payload).unwrap();
        let feed = feed_from_forecast(response).unwrap();

        assert_eq!(feed.city, "Budapest");
        assert_eq!(feed.utc_offset_secs, 7200);
        assert_eq!(feed.samples.len(), 1);
        let sample = &feed.samples[0];
        assert_eq!(sample.timestamp.hour(), 9);
        assert_eq!(sample.temperature_c, 22.0);
        assert_eq!(sample.pop, 0.25);
    }

    #[test]
    fn test_feed_from_forecast_defaults_missing_pop_to_zero() {
        let payload = serde_json::json!({
            "city": { "name": "Budapest", "country": "HU", "timezone": 0 },
            "list": [
                {
                    "dt": 1718002800,
                    "main": { "temp": 295.15, "humidity": 60, "pressure": 1015 },
                    "wind": { "speed": 2.0 },
                    "weather": [ { "description": "derült", "icon": "01d" } ]
                }
            ]
        });
        let response: ForecastResponse = serde_json::from_value(payload).unwrap();
        let feed = feed_from_forecast(response).unwrap();
        assert_eq!(feed.samples[0].pop, 0.0);
    }

    #[tokio::test]
    async fn test_fetch_current_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Budapest"))
            .and(query_param("appid", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_payload()))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::new(&server.uri(), "test-key", "hu");
        let obs = client.fetch_current("Budapest").await.unwrap();

        assert_eq!(obs.city, "Budapest");
        assert_eq!(obs.temperature_c, 22.5);
    }

    #[tokio::test]
    async fn test_fetch_current_unknown_city_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404", "message": "city not found"
            })))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::new(&server.uri(), "test-key", "hu");
        let err = client.fetch_current("Nowhere").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_current_upstream_5xx_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::new(&server.uri(), "test-key", "hu");
        let err = client.fetch_current("Budapest").await.unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }

    #[tokio::test]
    async fn test_fetch_forecast_samples_passes_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("cnt", "16"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "city": { "name": "Budapest", "country": "HU", "timezone": 7200 },
                "list": []
            })))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::new(&server.uri(), "test-key", "hu");
        let feed = client.fetch_forecast_samples("Budapest", 16).await.unwrap();
        assert!(feed.samples.is_empty());
    }
}
