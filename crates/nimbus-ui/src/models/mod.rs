pub mod location_model;
pub mod weather_model;

pub use location_model::{LocationCoordinator, LocationState, LocationUpdate};
pub use weather_model::{AppState, WeatherCoordinator, CURRENT_LOCATION_LABEL};
