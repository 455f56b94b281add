use chrono::{DateTime, NaiveDateTime, Utc};
use nimbus_core::{AppError, LocationError, NetworkError, ReqwestErrorExt, WeatherError};
use serde::{Deserialize, Serialize};

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Foggy,
    Drizzle,
    Rainy,
    Snowy,
    Stormy,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1 | 2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Foggy,
            51 | 53 | 55 | 56 | 57 => Self::Drizzle,
            61 | 63 | 65 | 66 | 67 | 80 | 81 | 82 => Self::Rainy,
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snowy,
            95 | 96 | 99 => Self::Stormy,
            _ => Self::Clear, // Unknown codes default to clear
        }
    }

    /// Get a human-readable description of the category
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Foggy => "Foggy",
            Self::Drizzle => "Drizzle",
            Self::Rainy => "Rainy",
            Self::Snowy => "Snowy",
            Self::Stormy => "Stormy",
        }
    }

    /// Get icon name for the presentation layer
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear => "sun",
            Self::PartlyCloudy => "cloud_sun",
            Self::Cloudy => "cloud",
            Self::Foggy => "cloud_fog",
            Self::Drizzle => "cloud_drizzle",
            Self::Rainy => "cloud_rain",
            Self::Snowy => "cloud_snow",
            Self::Stormy => "cloud_lightning",
        }
    }
}

/// Icon name for a raw WMO code. Unmapped codes get the clear icon.
pub fn icon_for_code(code: i32) -> &'static str {
    WeatherCondition::from_wmo_code(code).icon_name()
}

/// Detailed description for a raw WMO code. Unmapped codes are "Unknown".
pub fn description_for_code(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

/// Location permission as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthorizationState {
    #[default]
    Undetermined,
    Denied,
    Restricted,
    AuthorizedLimited,
    AuthorizedFull,
    /// A platform status the device could not classify
    Unknown,
}

impl AuthorizationState {
    pub fn is_authorized(self) -> bool {
        matches!(self, Self::AuthorizedLimited | Self::AuthorizedFull)
    }

    pub fn is_denied(self) -> bool {
        matches!(self, Self::Denied | Self::Restricted)
    }
}

/// A single device location fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: Utc::now(),
        }
    }
}

/// Reverse geocoding candidate. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placemark {
    pub locality: Option<String>,
    pub administrative_area: Option<String>,
    pub sub_administrative_area: Option<String>,
    pub country: Option<String>,
}

impl Placemark {
    /// Most specific non-empty name, falling back to "Unknown Location"
    pub fn place_name(&self) -> String {
        [
            &self.locality,
            &self.administrative_area,
            &self.sub_administrative_area,
            &self.country,
        ]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_LOCATION)
        .to_string()
    }
}

pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// A place resolved by the weather API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub region: Option<String>,
}

impl Place {
    pub fn new(name: impl Into<String>, region: Option<String>) -> Self {
        Self {
            name: name.into(),
            region,
        }
    }

    /// "name, region" or just "name"
    pub fn display_name(&self) -> String {
        match self.region.as_deref().filter(|r| !r.is_empty()) {
            Some(region) => format!("{}, {}", self.name, region),
            None => self.name.clone(),
        }
    }
}

/// Current conditions as returned by the weather API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub condition_code: i32,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub observed_at: NaiveDateTime,
}

impl WeatherSnapshot {
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_wmo_code(self.condition_code)
    }
}

/// Failure kinds reported by the device location subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFailure {
    Unavailable,
    PermissionDenied,
    Network,
    Other(String),
}

impl From<DeviceFailure> for LocationError {
    fn from(failure: DeviceFailure) -> Self {
        match failure {
            DeviceFailure::Unavailable => LocationError::LocationUnavailable,
            DeviceFailure::PermissionDenied => LocationError::PermissionDenied,
            DeviceFailure::Network => LocationError::NetworkFailure,
            DeviceFailure::Other(description) => LocationError::Other(description),
        }
    }
}

/// Weather and geocoding provider errors
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Weather API returned status {status}")]
    Api { status: u16 },
    #[error("Location not found: {0}")]
    LocationNotFound(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.into_network_error())
    }
}

impl From<ProviderError> for WeatherError {
    fn from(e: ProviderError) -> Self {
        WeatherError::FetchFailed(e.to_string())
    }
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Network(e) => AppError::Network(e),
            other => AppError::Weather(other.into()),
        }
    }
}
