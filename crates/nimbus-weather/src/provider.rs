//! Open-Meteo weather client.
//!
//! A lookup by place name is two calls: the geocoding search resolves the
//! name to coordinates, then the forecast API returns current conditions.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{Place, ProviderError, WeatherSnapshot};

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Fetches current weather for a place name.
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    /// # Errors
    /// Returns `ProviderError` whose `Display` is shown to the user.
    async fn fetch_weather(&self, place_name: &str)
        -> Result<(WeatherSnapshot, Place), ProviderError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    name: String,
    latitude: f64,
    longitude: f64,
    admin1: Option<String>,
    country: Option<String>,
}

impl SearchResult {
    fn place(&self) -> Place {
        let region = self
            .admin1
            .as_ref()
            .filter(|a| !a.is_empty() && **a != self.name)
            .or(self.country.as_ref())
            .cloned();
        Place::new(self.name.clone(), region)
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: String,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    weather_code: i32,
    wind_speed_10m: f64,
}

impl TryFrom<CurrentBlock> for WeatherSnapshot {
    type Error = ProviderError;

    fn try_from(current: CurrentBlock) -> Result<Self, Self::Error> {
        let observed_at = NaiveDateTime::parse_from_str(&current.time, TIME_FORMAT)
            .map_err(|e| ProviderError::Parse(format!("bad time '{}': {}", current.time, e)))?;

        Ok(WeatherSnapshot {
            condition_code: current.weather_code,
            temperature: current.temperature_2m,
            feels_like: current.apparent_temperature,
            humidity: current.relative_humidity_2m.round().clamp(0.0, 100.0) as u8,
            wind_speed: current.wind_speed_10m,
            observed_at,
        })
    }
}

/// Open-Meteo client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    forecast_url: String,
    geocoding_url: String,
}

impl WeatherProvider {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        forecast_url: &str,
        geocoding_url: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client: Arc::new(client),
            forecast_url: forecast_url.trim_end_matches('/').to_string(),
            geocoding_url: geocoding_url.trim_end_matches('/').to_string(),
        })
    }

    async fn search(&self, place_name: &str) -> Result<SearchResult, ProviderError> {
        let url = format!("{}/v1/search", self.geocoding_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("name", place_name),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Api {
                status: response.status().as_u16(),
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        body.results
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::LocationNotFound(place_name.to_string()))
    }

    async fn current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherSnapshot, ProviderError> {
        let url = format!("{}/v1/forecast", self.forecast_url);
        let lat = latitude.to_string();
        let lon = longitude.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", lat.as_str()),
                ("longitude", lon.as_str()),
                ("current", CURRENT_FIELDS),
                ("timezone", "auto"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Api {
                status: response.status().as_u16(),
            });
        }

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        WeatherSnapshot::try_from(body.current)
    }
}

#[async_trait]
impl WeatherFetcher for WeatherProvider {
    async fn fetch_weather(
        &self,
        place_name: &str,
    ) -> Result<(WeatherSnapshot, Place), ProviderError> {
        let found = self.search(place_name).await?;
        tracing::debug!(
            "Resolved '{}' to {} ({:.4}, {:.4})",
            place_name,
            found.name,
            found.latitude,
            found.longitude
        );

        let snapshot = self.current(found.latitude, found.longitude).await?;
        Ok((snapshot, found.place()))
    }
}
