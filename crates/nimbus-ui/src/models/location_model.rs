//! Location permission and one-shot fix lifecycle.
//!
//! The coordinator is owned by a single context. Device callbacks arrive as
//! `LocationEvent`s on its inbox and are applied by `handle_event`, never
//! from the device's own thread.

use std::sync::Arc;

use nimbus_core::LocationError;
use nimbus_weather::{AuthorizationState, DeviceFailure, DeviceLocation, LocationEvent, LocationFix};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Observable location state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationState {
    pub authorization: AuthorizationState,
    pub last_fix: Option<LocationFix>,
    pub last_error: Option<LocationError>,
    pub is_requesting: bool,
}

/// A committed change, delivered to subscribers in order
#[derive(Debug, Clone, PartialEq)]
pub enum LocationUpdate {
    Authorization(AuthorizationState),
    Requesting(bool),
    Fix(LocationFix),
    Error(LocationError),
}

pub struct LocationCoordinator {
    device: Arc<dyn DeviceLocation>,
    events: UnboundedReceiver<LocationEvent>,
    state: LocationState,
    observers: Vec<UnboundedSender<LocationUpdate>>,
}

impl LocationCoordinator {
    /// `events` must be the receiving end of the channel `device` emits on.
    pub fn new(device: Arc<dyn DeviceLocation>, events: UnboundedReceiver<LocationEvent>) -> Self {
        let state = LocationState {
            authorization: device.authorization_status(),
            ..Default::default()
        };

        Self {
            device,
            events,
            state,
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> &LocationState {
        &self.state
    }

    pub fn authorization(&self) -> AuthorizationState {
        self.state.authorization
    }

    /// Subscribe to state changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> UnboundedReceiver<LocationUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    /// Prompt for permission if it has not been decided yet.
    pub fn request_permission(&self) {
        if self.state.authorization == AuthorizationState::Undetermined {
            tracing::info!("Requesting location permission");
            self.device.request_authorization();
        }
    }

    /// Start a one-shot fix if permission allows it.
    pub fn request_location(&mut self) {
        match self.state.authorization {
            AuthorizationState::Undetermined => {
                self.request_permission();
            }
            AuthorizationState::Denied | AuthorizationState::Restricted => {
                self.set_error(LocationError::PermissionDenied);
            }
            AuthorizationState::AuthorizedLimited | AuthorizationState::AuthorizedFull => {
                if self.state.is_requesting {
                    tracing::debug!("Location request already in flight; coalescing");
                    return;
                }
                self.state.last_error = None;
                self.set_requesting(true);
                tracing::info!("Requesting one-time location fix");
                self.device.request_one_time_fix();
            }
            AuthorizationState::Unknown => {
                self.set_error(LocationError::UnknownAuthorization);
            }
        }
    }

    /// Apply a device notification.
    pub fn handle_event(&mut self, event: LocationEvent) {
        match event {
            LocationEvent::AuthorizationChanged(status) => self.on_authorization_changed(status),
            LocationEvent::FixReceived(fixes) => self.on_fix_received(fixes),
            LocationEvent::Failed(failure) => self.on_failure(failure),
        }
    }

    /// Next queued device notification, if any.
    pub fn try_next_event(&mut self) -> Option<LocationEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the next device notification. `None` once the device is gone.
    pub async fn next_event(&mut self) -> Option<LocationEvent> {
        self.events.recv().await
    }

    fn on_fix_received(&mut self, fixes: Vec<LocationFix>) {
        // Only the first fix of a batch is kept
        let Some(fix) = fixes.into_iter().next() else {
            self.on_failure(DeviceFailure::Unavailable);
            return;
        };

        tracing::info!("Got location: {:.4}, {:.4}", fix.latitude, fix.longitude);
        self.set_requesting(false);
        self.state.last_error = None;
        self.state.last_fix = Some(fix);
        self.publish(LocationUpdate::Fix(fix));
    }

    fn on_failure(&mut self, failure: DeviceFailure) {
        tracing::warn!("Location request failed: {:?}", failure);
        self.set_requesting(false);
        self.set_error(LocationError::from(failure));
    }

    fn on_authorization_changed(&mut self, status: AuthorizationState) {
        let previous = self.state.authorization;
        self.state.authorization = status;
        tracing::info!("Location authorization changed: {:?} -> {:?}", previous, status);
        self.publish(LocationUpdate::Authorization(status));

        match status {
            AuthorizationState::AuthorizedLimited | AuthorizationState::AuthorizedFull => {
                if !previous.is_authorized() {
                    self.request_location();
                }
            }
            AuthorizationState::Denied | AuthorizationState::Restricted => {
                self.set_error(LocationError::PermissionDenied);
            }
            AuthorizationState::Undetermined => {}
            AuthorizationState::Unknown => {
                self.set_error(LocationError::UnknownAuthorization);
            }
        }
    }

    fn set_requesting(&mut self, requesting: bool) {
        if self.state.is_requesting != requesting {
            self.state.is_requesting = requesting;
            self.publish(LocationUpdate::Requesting(requesting));
        }
    }

    fn set_error(&mut self, error: LocationError) {
        self.state.last_error = Some(error.clone());
        self.publish(LocationUpdate::Error(error));
    }

    fn publish(&mut self, update: LocationUpdate) {
        self.observers.retain(|tx| tx.send(update.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDevice;
    use rstest::rstest;

    fn coordinator(
        status: AuthorizationState,
    ) -> (
        LocationCoordinator,
        Arc<FakeDevice>,
        UnboundedSender<LocationEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let device = Arc::new(FakeDevice::new(status));
        let coordinator = LocationCoordinator::new(device.clone(), rx);
        (coordinator, device, tx)
    }

    fn drain(rx: &mut UnboundedReceiver<LocationUpdate>) -> Vec<LocationUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    #[rstest]
    #[case(AuthorizationState::Undetermined, 1, 0, None, false)]
    #[case(AuthorizationState::Denied, 0, 0, Some(LocationError::PermissionDenied), false)]
    #[case(AuthorizationState::Restricted, 0, 0, Some(LocationError::PermissionDenied), false)]
    #[case(AuthorizationState::AuthorizedLimited, 0, 1, None, true)]
    #[case(AuthorizationState::AuthorizedFull, 0, 1, None, true)]
    #[case(AuthorizationState::Unknown, 0, 0, Some(LocationError::UnknownAuthorization), false)]
    fn request_location_outcome_depends_only_on_authorization(
        #[case] status: AuthorizationState,
        #[case] prompts: usize,
        #[case] fixes: usize,
        #[case] error: Option<LocationError>,
        #[case] requesting: bool,
    ) {
        let (mut coordinator, device, _tx) = coordinator(status);

        coordinator.request_location();

        assert_eq!(device.authorization_requests(), prompts);
        assert_eq!(device.fix_requests(), fixes);
        assert_eq!(coordinator.state().last_error, error);
        assert_eq!(coordinator.state().is_requesting, requesting);
    }

    #[test]
    fn authorized_request_clears_previous_error() {
        let (mut coordinator, _device, _tx) = coordinator(AuthorizationState::AuthorizedFull);
        coordinator.handle_event(LocationEvent::Failed(DeviceFailure::Unavailable));
        assert!(coordinator.state().last_error.is_some());

        coordinator.request_location();

        assert_eq!(coordinator.state().last_error, None);
    }

    #[test]
    fn second_request_while_in_flight_is_coalesced() {
        let (mut coordinator, device, _tx) = coordinator(AuthorizationState::AuthorizedFull);

        coordinator.request_location();
        coordinator.request_location();

        assert_eq!(device.fix_requests(), 1);
    }

    #[test]
    fn request_permission_only_prompts_when_undetermined() {
        let (coordinator, device, _tx) = coordinator(AuthorizationState::Denied);
        coordinator.request_permission();
        assert_eq!(device.authorization_requests(), 0);

        let (coordinator, device, _tx) = self::coordinator(AuthorizationState::Undetermined);
        coordinator.request_permission();
        assert_eq!(device.authorization_requests(), 1);
    }

    #[test]
    fn fix_keeps_only_first_of_batch() {
        let (mut coordinator, _device, _tx) = coordinator(AuthorizationState::AuthorizedFull);
        coordinator.request_location();

        let first = LocationFix::new(10.0, 20.0);
        let second = LocationFix::new(11.0, 21.0);
        coordinator.handle_event(LocationEvent::FixReceived(vec![first, second]));

        assert_eq!(coordinator.state().last_fix, Some(first));
        assert!(!coordinator.state().is_requesting);
        assert_eq!(coordinator.state().last_error, None);
    }

    #[test]
    fn empty_fix_batch_is_unavailable() {
        let (mut coordinator, _device, _tx) = coordinator(AuthorizationState::AuthorizedFull);
        coordinator.request_location();

        coordinator.handle_event(LocationEvent::FixReceived(Vec::new()));

        assert_eq!(
            coordinator.state().last_error,
            Some(LocationError::LocationUnavailable)
        );
        assert!(!coordinator.state().is_requesting);
    }

    #[rstest]
    #[case(DeviceFailure::Unavailable, LocationError::LocationUnavailable)]
    #[case(DeviceFailure::PermissionDenied, LocationError::PermissionDenied)]
    #[case(DeviceFailure::Network, LocationError::NetworkFailure)]
    #[case(
        DeviceFailure::Other("no satellites".into()),
        LocationError::Other("no satellites".into())
    )]
    fn failure_maps_to_user_error(
        #[case] failure: DeviceFailure,
        #[case] expected: LocationError,
    ) {
        let (mut coordinator, _device, _tx) = coordinator(AuthorizationState::AuthorizedFull);
        coordinator.request_location();

        coordinator.handle_event(LocationEvent::Failed(failure));

        assert!(!coordinator.state().is_requesting);
        assert_eq!(coordinator.state().last_error, Some(expected));
    }

    #[test]
    fn grant_automatically_requests_fix() {
        let (mut coordinator, device, _tx) = coordinator(AuthorizationState::Undetermined);

        coordinator.handle_event(LocationEvent::AuthorizationChanged(
            AuthorizationState::AuthorizedFull,
        ));

        assert_eq!(coordinator.authorization(), AuthorizationState::AuthorizedFull);
        assert_eq!(device.fix_requests(), 1);
        assert!(coordinator.state().is_requesting);
    }

    #[test]
    fn repeated_grant_does_not_request_again() {
        let (mut coordinator, device, _tx) = coordinator(AuthorizationState::AuthorizedFull);

        coordinator.handle_event(LocationEvent::AuthorizationChanged(
            AuthorizationState::AuthorizedLimited,
        ));

        assert_eq!(device.fix_requests(), 0);
    }

    #[test]
    fn denial_sets_permission_error() {
        let (mut coordinator, device, _tx) = coordinator(AuthorizationState::Undetermined);

        coordinator.handle_event(LocationEvent::AuthorizationChanged(AuthorizationState::Denied));

        assert_eq!(
            coordinator.state().last_error,
            Some(LocationError::PermissionDenied)
        );
        assert_eq!(device.fix_requests(), 0);
    }

    #[test]
    fn unknown_authorization_change_sets_error() {
        let (mut coordinator, device, _tx) = coordinator(AuthorizationState::Undetermined);
        let mut updates = coordinator.subscribe();

        coordinator.handle_event(LocationEvent::AuthorizationChanged(
            AuthorizationState::Unknown,
        ));

        assert_eq!(coordinator.authorization(), AuthorizationState::Unknown);
        assert_eq!(
            coordinator.state().last_error,
            Some(LocationError::UnknownAuthorization)
        );
        assert_eq!(device.fix_requests(), 0);
        assert_eq!(
            drain(&mut updates),
            vec![
                LocationUpdate::Authorization(AuthorizationState::Unknown),
                LocationUpdate::Error(LocationError::UnknownAuthorization),
            ]
        );
    }

    #[test]
    fn undetermined_change_waits() {
        let (mut coordinator, device, _tx) = coordinator(AuthorizationState::Undetermined);

        coordinator.handle_event(LocationEvent::AuthorizationChanged(
            AuthorizationState::Undetermined,
        ));

        assert_eq!(coordinator.state().last_error, None);
        assert_eq!(device.fix_requests(), 0);
    }

    #[test]
    fn subscribers_see_updates_in_order() {
        let (mut coordinator, _device, _tx) = coordinator(AuthorizationState::AuthorizedFull);
        let mut updates = coordinator.subscribe();

        coordinator.request_location();
        let fix = LocationFix::new(1.0, 2.0);
        coordinator.handle_event(LocationEvent::FixReceived(vec![fix]));

        assert_eq!(
            drain(&mut updates),
            vec![
                LocationUpdate::Requesting(true),
                LocationUpdate::Requesting(false),
                LocationUpdate::Fix(fix),
            ]
        );
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let (mut coordinator, _device, _tx) = coordinator(AuthorizationState::Denied);
        let dropped = coordinator.subscribe();
        let mut kept = coordinator.subscribe();
        drop(dropped);

        coordinator.request_location();

        assert_eq!(coordinator.observers.len(), 1);
        assert_eq!(
            drain(&mut kept),
            vec![LocationUpdate::Error(LocationError::PermissionDenied)]
        );
    }

    #[test]
    fn queued_events_are_read_from_inbox() {
        let (mut coordinator, _device, tx) = coordinator(AuthorizationState::AuthorizedFull);
        tx.send(LocationEvent::Failed(DeviceFailure::Network)).unwrap();

        let event = coordinator.try_next_event().unwrap();
        coordinator.handle_event(event);

        assert_eq!(
            coordinator.state().last_error,
            Some(LocationError::NetworkFailure)
        );
        assert!(coordinator.try_next_event().is_none());
    }
}
