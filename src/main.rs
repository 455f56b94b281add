use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use nimbus_core::AppError;
use nimbus_ui::{AppState, LocationCoordinator, WeatherCoordinator};
use nimbus_weather::{ConfiguredDeviceLocation, NominatimGeocoder, WeatherProvider};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = nimbus_core::init() {
        eprintln!("{}", e);
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let (config, _) = nimbus_core::Config::load_validated().map_err(AppError::classify)?;
    let timeout = Duration::from_secs(config.weather.timeout_secs);

    let provider = WeatherProvider::new(
        &config.weather.forecast_url,
        &config.weather.geocoding_url,
        timeout,
    )?;
    let geocoder = NominatimGeocoder::new(&config.location.reverse_geocode_url, timeout)?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let device = ConfiguredDeviceLocation::new(
        config.location.enabled,
        config.location.coordinates(),
        events_tx,
    );
    let location = LocationCoordinator::new(Arc::new(device), events_rx);
    let mut coordinator =
        WeatherCoordinator::new(location, Arc::new(provider), Arc::new(geocoder));

    // Anything on the command line is a city search; nothing means "where am I"
    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.is_empty() {
        coordinator.request_current_location_weather();
    } else {
        coordinator.search_weather(&query);
    }

    coordinator.run_until_settled().await;
    render(coordinator.state());

    Ok(())
}

fn render(state: &AppState) {
    if let Some(message) = &state.error_message {
        eprintln!("{}", message);
    }

    let Some(weather) = &state.weather else {
        return;
    };

    let stale = if state.is_stale { " (outdated)" } else { "" };
    println!("{}{}", state.location_display_name(), stale);
    println!(
        "  [{}] {}",
        state.current_condition_icon(),
        state.current_condition_description()
    );
    println!(
        "  {:.1}°  feels like {:.1}°",
        weather.temperature, weather.feels_like
    );
    println!(
        "  humidity {}%  wind {:.1} km/h",
        weather.humidity, weather.wind_speed
    );
    println!("  observed {}", weather.observed_at.format("%Y-%m-%d %H:%M"));
}
