//! Device location subsystem interface.
//!
//! Requests return immediately; outcomes arrive later as `LocationEvent`s on
//! the channel the device was built with.

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::types::{AuthorizationState, DeviceFailure, LocationFix};

/// Notifications emitted by the device location subsystem
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    AuthorizationChanged(AuthorizationState),
    FixReceived(Vec<LocationFix>),
    Failed(DeviceFailure),
}

pub trait DeviceLocation: Send + Sync {
    /// Current permission status, read once at startup
    fn authorization_status(&self) -> AuthorizationState;

    /// Prompt the user for permission
    fn request_authorization(&self);

    /// Ask for a single location fix
    fn request_one_time_fix(&self);
}

/// Device backed by static settings, for hosts without a positioning service.
///
/// The "prompt" is answered by `enabled`, and fixes come from the configured
/// coordinates.
#[derive(Debug)]
pub struct ConfiguredDeviceLocation {
    enabled: bool,
    coordinates: Option<(f64, f64)>,
    authorization: Mutex<AuthorizationState>,
    events: UnboundedSender<LocationEvent>,
}

impl ConfiguredDeviceLocation {
    pub fn new(
        enabled: bool,
        coordinates: Option<(f64, f64)>,
        events: UnboundedSender<LocationEvent>,
    ) -> Self {
        Self {
            enabled,
            coordinates,
            authorization: Mutex::new(AuthorizationState::Undetermined),
            events,
        }
    }

    fn emit(&self, event: LocationEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Location event dropped; coordinator is gone");
        }
    }
}

impl DeviceLocation for ConfiguredDeviceLocation {
    fn authorization_status(&self) -> AuthorizationState {
        *self.authorization.lock()
    }

    fn request_authorization(&self) {
        let status = if self.enabled {
            AuthorizationState::AuthorizedFull
        } else {
            AuthorizationState::Denied
        };

        *self.authorization.lock() = status;
        tracing::info!("Location authorization answered: {:?}", status);
        self.emit(LocationEvent::AuthorizationChanged(status));
    }

    fn request_one_time_fix(&self) {
        let event = match self.coordinates {
            Some((latitude, longitude)) => {
                LocationEvent::FixReceived(vec![LocationFix::new(latitude, longitude)])
            }
            None => LocationEvent::Failed(DeviceFailure::Unavailable),
        };
        self.emit(event);
    }
}
