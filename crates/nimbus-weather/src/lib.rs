//! Weather data and collaborators for Nimbus
//!
//! Current conditions via the Open-Meteo API, reverse geocoding via
//! Nominatim, and the device location interface.

pub mod geocode;
pub mod location;
pub mod provider;
pub mod types;

pub use geocode::{derive_place_name, NominatimGeocoder, ReverseGeocoder};
pub use location::{ConfiguredDeviceLocation, DeviceLocation, LocationEvent};
pub use provider::{WeatherFetcher, WeatherProvider};
pub use types::*;
