//! State coordination for Nimbus.
//!
//! `LocationCoordinator` owns permission and the one-shot fix;
//! `WeatherCoordinator` turns fixes and searches into a single `AppState`.

pub mod models;
pub mod services;

#[cfg(test)]
mod testing;

pub use models::{
    AppState, LocationCoordinator, LocationState, LocationUpdate, WeatherCoordinator,
    CURRENT_LOCATION_LABEL,
};
pub use services::{ServiceError, WeatherServiceMessage};
