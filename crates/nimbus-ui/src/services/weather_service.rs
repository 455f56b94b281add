//! Weather backend: reverse geocoding and weather fetches.
//! All network work runs off the owning context; results sent via mpsc.

use std::sync::Arc;

use nimbus_weather::{
    LocationFix, Place, Placemark, ProviderError, ReverseGeocoder, WeatherFetcher,
    WeatherSnapshot,
};
use tokio::sync::mpsc::UnboundedSender;

/// Error type for background weather operations
#[derive(Debug)]
pub enum ServiceError {
    Provider(ProviderError),
    NotInitialized,
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Provider(e) => write!(f, "{}", e),
            ServiceError::NotInitialized => write!(f, "Weather service not initialized"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<ProviderError> for ServiceError {
    fn from(e: ProviderError) -> Self {
        ServiceError::Provider(e)
    }
}

/// Messages sent from async operations back to the owning context.
///
/// `generation` identifies the cycle that started the work.
#[derive(Debug)]
pub enum WeatherServiceMessage {
    GeocodeDone {
        generation: u64,
        result: Result<Vec<Placemark>, ServiceError>,
    },
    FetchDone {
        generation: u64,
        result: Result<(WeatherSnapshot, Place), ServiceError>,
    },
}

/// Request reverse geocoding of `fix`.
/// Sends `GeocodeDone` on the channel when complete.
pub fn request_reverse_geocode(
    tx: &UnboundedSender<WeatherServiceMessage>,
    geocoder: Arc<dyn ReverseGeocoder>,
    fix: LocationFix,
    generation: u64,
) {
    let tx = tx.clone();
    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(r) => r,
        Err(_) => {
            let _ = tx.send(WeatherServiceMessage::GeocodeDone {
                generation,
                result: Err(ServiceError::NotInitialized),
            });
            return;
        }
    };

    runtime.spawn(async move {
        let result = geocoder.resolve(&fix).await.map_err(ServiceError::from);
        let _ = tx.send(WeatherServiceMessage::GeocodeDone { generation, result });
    });
}

/// Request weather for `place_name`.
/// Sends `FetchDone` on the channel when complete.
pub fn request_fetch(
    tx: &UnboundedSender<WeatherServiceMessage>,
    fetcher: Arc<dyn WeatherFetcher>,
    place_name: String,
    generation: u64,
) {
    let tx = tx.clone();
    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(r) => r,
        Err(_) => {
            let _ = tx.send(WeatherServiceMessage::FetchDone {
                generation,
                result: Err(ServiceError::NotInitialized),
            });
            return;
        }
    };

    runtime.spawn(async move {
        let result = fetcher
            .fetch_weather(&place_name)
            .await
            .map_err(ServiceError::from);
        let _ = tx.send(WeatherServiceMessage::FetchDone { generation, result });
    });
}
