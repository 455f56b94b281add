//! Weather view-model.
//!
//! Turns location updates, user intents and background completions into a
//! single `AppState`. Every method runs on the owning context; background
//! work reports back through the service channel and is applied by
//! `poll_channel` / `process_next`.

use std::sync::Arc;

use nimbus_core::{LocationError, WeatherError};
use nimbus_weather::{
    derive_place_name, description_for_code, AuthorizationState, LocationEvent, LocationFix,
    Place, Placemark, ReverseGeocoder, WeatherCondition, WeatherFetcher, WeatherSnapshot,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

use super::location_model::{LocationCoordinator, LocationUpdate};
use crate::services::weather_service::{self, ServiceError, WeatherServiceMessage};

/// Shown when no place has been resolved yet
pub const CURRENT_LOCATION_LABEL: &str = "Current Location";

/// Everything the presentation layer renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub weather: Option<WeatherSnapshot>,
    pub place: Option<Place>,
    /// `weather` is a leftover from before the current error
    pub is_stale: bool,
}

impl AppState {
    pub fn has_weather_data(&self) -> bool {
        self.weather.is_some()
    }

    pub fn has_error(&self) -> bool {
        self.error_message.is_some()
    }

    pub fn location_display_name(&self) -> String {
        self.place
            .as_ref()
            .map(Place::display_name)
            .unwrap_or_else(|| CURRENT_LOCATION_LABEL.to_string())
    }

    pub fn current_weather_condition(&self) -> WeatherCondition {
        self.weather
            .as_ref()
            .map(WeatherSnapshot::condition)
            .unwrap_or_default()
    }

    pub fn current_condition_icon(&self) -> &'static str {
        self.current_weather_condition().icon_name()
    }

    pub fn current_condition_description(&self) -> &'static str {
        self.weather
            .as_ref()
            .map(|w| description_for_code(w.condition_code))
            .unwrap_or_else(|| WeatherCondition::Clear.description())
    }
}

enum Inbound {
    Location(LocationEvent),
    Service(WeatherServiceMessage),
}

pub struct WeatherCoordinator {
    location: LocationCoordinator,
    location_updates: UnboundedReceiver<LocationUpdate>,
    fetcher: Arc<dyn WeatherFetcher>,
    geocoder: Arc<dyn ReverseGeocoder>,
    tx: UnboundedSender<WeatherServiceMessage>,
    rx: UnboundedReceiver<WeatherServiceMessage>,
    state: AppState,
    state_tx: watch::Sender<AppState>,
    // Bumped whenever newer work or a newer outcome supersedes what is in flight
    generation: u64,
}

impl WeatherCoordinator {
    pub fn new(
        mut location: LocationCoordinator,
        fetcher: Arc<dyn WeatherFetcher>,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Self {
        let location_updates = location.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(AppState::default());

        Self {
            location,
            location_updates,
            fetcher,
            geocoder,
            tx,
            rx,
            state: AppState::default(),
            state_tx,
            generation: 0,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn location(&self) -> &LocationCoordinator {
        &self.location
    }

    /// Receive every committed `AppState`. Closed when the coordinator is dropped.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state_tx.subscribe()
    }

    /// Look up weather for a user-entered city.
    pub fn search_weather(&mut self, city_name: &str) {
        let city = city_name.trim();
        if city.is_empty() {
            self.state.error_message = Some(WeatherError::EmptyInput.to_string());
            self.state.is_stale = self.state.weather.is_some();
            self.publish();
            return;
        }

        self.start_fetch(city.to_string());
    }

    /// Re-fetch the shown place, or locate the device if nothing is shown yet.
    pub fn refresh_weather(&mut self) {
        match self.state.place.as_ref().map(|p| p.name.clone()) {
            Some(name) => self.start_fetch(name),
            None => self.request_current_location_weather(),
        }
    }

    /// Weather for wherever the device is. Also the retry action.
    pub fn request_current_location_weather(&mut self) {
        self.state.error_message = None;

        match self.location.authorization() {
            AuthorizationState::Undetermined => self.location.request_permission(),
            status if status.is_denied() => {
                self.supersede();
                self.state.is_loading = false;
                self.state.error_message = Some(LocationError::PermissionDenied.to_string());
                self.state.is_stale = self.state.weather.is_some();
            }
            _ => self.location.request_location(),
        }

        self.publish();
        self.drain_location_updates();
    }

    /// Apply everything already queued. Returns the number of messages handled.
    pub fn poll_channel(&mut self) -> usize {
        let mut handled = 0;

        loop {
            if let Some(event) = self.location.try_next_event() {
                self.handle_location_event(event);
            } else if let Ok(msg) = self.rx.try_recv() {
                self.handle_service_message(msg);
            } else {
                break;
            }
            handled += 1;
        }

        handled
    }

    /// Wait for and apply one inbound message.
    ///
    /// The service channel never closes while the coordinator is alive, so
    /// this waits as long as a device request stays unanswered. Wrap it in
    /// `tokio::time::timeout` when the device may never call back.
    pub async fn process_next(&mut self) {
        let inbound = tokio::select! {
            Some(event) = self.location.next_event() => Inbound::Location(event),
            msg = self.rx.recv() => match msg {
                Some(msg) => Inbound::Service(msg),
                None => return,
            },
        };

        match inbound {
            Inbound::Location(event) => self.handle_location_event(event),
            Inbound::Service(msg) => self.handle_service_message(msg),
        }
    }

    /// True while a location request or a weather cycle is outstanding.
    pub fn is_busy(&self) -> bool {
        self.state.is_loading || self.location.state().is_requesting
    }

    /// Process messages until nothing is queued and no work is outstanding.
    pub async fn run_until_settled(&mut self) {
        loop {
            self.poll_channel();
            if !self.is_busy() {
                break;
            }
            self.process_next().await;
        }
    }

    fn handle_location_event(&mut self, event: LocationEvent) {
        self.location.handle_event(event);
        self.drain_location_updates();
    }

    fn drain_location_updates(&mut self) {
        while let Ok(update) = self.location_updates.try_recv() {
            match update {
                LocationUpdate::Requesting(true) => {
                    self.begin_cycle();
                }
                LocationUpdate::Fix(fix) => self.start_geocode(fix),
                LocationUpdate::Error(error) => {
                    // Weather from an earlier cycle is kept, flagged stale
                    self.supersede();
                    self.state.is_loading = false;
                    self.state.is_stale = self.state.weather.is_some();
                    self.state.error_message = Some(error.to_string());
                    self.publish();
                }
                LocationUpdate::Requesting(false) | LocationUpdate::Authorization(_) => {}
            }
        }
    }

    fn handle_service_message(&mut self, msg: WeatherServiceMessage) {
        match msg {
            WeatherServiceMessage::GeocodeDone { generation, result } => {
                if self.is_stale_generation(generation) {
                    return;
                }
                self.apply_geocode(result);
            }
            WeatherServiceMessage::FetchDone { generation, result } => {
                if self.is_stale_generation(generation) {
                    return;
                }
                self.apply_fetch(result);
            }
        }
    }

    fn is_stale_generation(&self, generation: u64) -> bool {
        if generation != self.generation {
            tracing::debug!(
                "Discarding result from cycle {} (current {})",
                generation,
                self.generation
            );
            return true;
        }
        false
    }

    /// Invalidate every geocode and fetch still in flight.
    fn supersede(&mut self) {
        self.generation += 1;
    }

    fn begin_cycle(&mut self) -> u64 {
        self.supersede();
        self.state.is_loading = true;
        self.state.error_message = None;
        self.publish();
        self.generation
    }

    fn start_geocode(&mut self, fix: LocationFix) {
        let generation = self.begin_cycle();
        weather_service::request_reverse_geocode(&self.tx, self.geocoder.clone(), fix, generation);
    }

    fn apply_geocode(&mut self, result: Result<Vec<Placemark>, ServiceError>) {
        let name = match result {
            Ok(placemarks) => derive_place_name(&placemarks),
            Err(e) => {
                tracing::warn!("Reverse geocoding failed: {}", e);
                None
            }
        };

        match name {
            Some(name) => self.start_fetch(name),
            None => self.settle(Err(WeatherError::GeocodingFailed.to_string())),
        }
    }

    fn start_fetch(&mut self, place_name: String) {
        let generation = self.begin_cycle();
        tracing::info!("Fetching weather for '{}' (cycle {})", place_name, generation);
        weather_service::request_fetch(&self.tx, self.fetcher.clone(), place_name, generation);
    }

    fn apply_fetch(&mut self, result: Result<(WeatherSnapshot, Place), ServiceError>) {
        match result {
            Ok((weather, place)) => {
                tracing::info!("Weather fetched for {}", place.display_name());
                self.settle(Ok((weather, place)));
            }
            Err(e) => {
                tracing::error!("Failed to fetch weather: {}", e);
                self.settle(Err(WeatherError::FetchFailed(e.to_string()).to_string()));
            }
        }
    }

    /// End of a fetch cycle: data and error are replaced together.
    fn settle(&mut self, outcome: Result<(WeatherSnapshot, Place), String>) {
        match outcome {
            Ok((weather, place)) => {
                self.state.weather = Some(weather);
                self.state.place = Some(place);
                self.state.error_message = None;
            }
            Err(message) => {
                self.state.weather = None;
                self.state.place = None;
                self.state.error_message = Some(message);
            }
        }
        self.state.is_stale = false;
        self.state.is_loading = false;
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}
