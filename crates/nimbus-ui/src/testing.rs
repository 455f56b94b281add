//! Fake collaborators for coordinator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use nimbus_weather::{
    AuthorizationState, DeviceLocation, LocationFix, Place, Placemark, ProviderError,
    ReverseGeocoder, WeatherFetcher, WeatherSnapshot,
};

/// Device that only records what it was asked to do
pub struct FakeDevice {
    status: AuthorizationState,
    authorization_requests: AtomicUsize,
    fix_requests: AtomicUsize,
}

impl FakeDevice {
    pub fn new(status: AuthorizationState) -> Self {
        Self {
            status,
            authorization_requests: AtomicUsize::new(0),
            fix_requests: AtomicUsize::new(0),
        }
    }

    pub fn authorization_requests(&self) -> usize {
        self.authorization_requests.load(Ordering::SeqCst)
    }

    pub fn fix_requests(&self) -> usize {
        self.fix_requests.load(Ordering::SeqCst)
    }
}

impl DeviceLocation for FakeDevice {
    fn authorization_status(&self) -> AuthorizationState {
        self.status
    }

    fn request_authorization(&self) {
        self.authorization_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn request_one_time_fix(&self) {
        self.fix_requests.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn snapshot(condition_code: i32, temperature: f64) -> WeatherSnapshot {
    WeatherSnapshot {
        condition_code,
        temperature,
        feels_like: temperature - 1.0,
        humidity: 60,
        wind_speed: 8.0,
        observed_at: NaiveDate::from_ymd_opt(2026, 10, 19)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap(),
    }
}

struct CityWeather {
    snapshot: WeatherSnapshot,
    region: Option<String>,
    delay: Duration,
}

/// Weather fetcher answering from a fixed table. Unknown cities are not found.
#[derive(Default)]
pub struct FakeFetcher {
    cities: HashMap<String, CityWeather>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with_city(self, name: &str, region: Option<&str>, snapshot: WeatherSnapshot) -> Self {
        self.with_delayed_city(name, region, snapshot, Duration::ZERO)
    }

    pub fn with_delayed_city(
        mut self,
        name: &str,
        region: Option<&str>,
        snapshot: WeatherSnapshot,
        delay: Duration,
    ) -> Self {
        self.cities.insert(
            name.to_string(),
            CityWeather {
                snapshot,
                region: region.map(String::from),
                delay,
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WeatherFetcher for FakeFetcher {
    async fn fetch_weather(
        &self,
        place_name: &str,
    ) -> Result<(WeatherSnapshot, Place), ProviderError> {
        self.calls.lock().unwrap().push(place_name.to_string());

        let Some(city) = self.cities.get(place_name) else {
            return Err(ProviderError::LocationNotFound(place_name.to_string()));
        };

        if !city.delay.is_zero() {
            tokio::time::sleep(city.delay).await;
        }

        Ok((
            city.snapshot.clone(),
            Place::new(place_name, city.region.clone()),
        ))
    }
}

/// Reverse geocoder returning a fixed answer
pub struct FakeGeocoder {
    answer: Result<Vec<Placemark>, String>,
    calls: AtomicUsize,
}

impl FakeGeocoder {
    pub fn returning(placemarks: Vec<Placemark>) -> Self {
        Self {
            answer: Ok(placemarks),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for FakeGeocoder {
    async fn resolve(&self, _fix: &LocationFix) -> Result<Vec<Placemark>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().map_err(ProviderError::Parse)
    }
}
