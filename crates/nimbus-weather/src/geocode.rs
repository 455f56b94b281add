//! Reverse geocoding: convert coordinates to placemarks.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::types::{LocationFix, Placemark, ProviderError};

const USER_AGENT: &str = concat!("Nimbus/", env!("CARGO_PKG_VERSION"));

/// Resolves a location fix into candidate placemarks, most relevant first.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// # Errors
    /// Returns `ProviderError` if the lookup fails. An empty list means
    /// the service answered but knows no place at those coordinates.
    async fn resolve(&self, fix: &LocationFix) -> Result<Vec<Placemark>, ProviderError>;
}

/// Place name for the first placemark, or `None` if there are no candidates.
pub fn derive_place_name(placemarks: &[Placemark]) -> Option<String> {
    placemarks.first().map(Placemark::place_name)
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state_district: Option<String>,
    state: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

impl From<NominatimAddress> for Placemark {
    fn from(addr: NominatimAddress) -> Self {
        Placemark {
            locality: addr
                .city
                .or(addr.town)
                .or(addr.village)
                .or(addr.municipality),
            administrative_area: addr.state,
            sub_administrative_area: addr.county.or(addr.state_district),
            country: addr.country,
        }
    }
}

/// Nominatim-backed reverse geocoder
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn resolve(&self, fix: &LocationFix) -> Result<Vec<Placemark>, ProviderError> {
        let url = format!("{}/reverse", self.base_url);
        let lat = fix.latitude.to_string();
        let lon = fix.longitude.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("format", "json"),
                ("addressdetails", "1"),
                ("zoom", "10"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!("Reverse geocode returned status {}", response.status());
            return Err(ProviderError::Api {
                status: response.status().as_u16(),
            });
        }

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let placemarks: Vec<Placemark> = body.address.into_iter().map(Placemark::from).collect();

        tracing::info!(
            "Reverse geocoded ({:.4}, {:.4}) to {:?}",
            fix.latitude,
            fix.longitude,
            derive_place_name(&placemarks)
        );
        Ok(placemarks)
    }
}
