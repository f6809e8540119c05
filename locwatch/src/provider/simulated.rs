//! Scriptable in-process provider.
//!
//! Used by the test suite and by `locwatch replay`. Every call is recorded,
//! authorization prompts are answered with a configurable response, and
//! start/stop calls are confirmed immediately unless auto-confirm is off.
//! Compass and significant-change monitoring are both available by default.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::debug;

use super::{AccuracyProfile, LocationProvider, ProviderEvent, ProviderEventSender};
use crate::error::ProviderError;
use crate::fix::{HeadingReading, LocationFix};
use crate::permission::{AuthorizationState, PermissionLevel};
use crate::subscription::AccuracyTier;

/// A call the service made into the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProviderCall {
    RequestAuthorization(PermissionLevel),
    StartUpdates(AccuracyProfile),
    StopUpdates(AccuracyTier),
    StartHeading,
    StopHeading,
}

#[derive(Debug)]
struct SimState {
    authorization: AuthorizationState,
    prompt_response: AuthorizationState,
    services_enabled: bool,
    auto_confirm: bool,
    heading_available: bool,
    significant_change_available: bool,
    start_failures: VecDeque<ProviderError>,
    calls: Vec<ProviderCall>,
}

/// In-memory [`LocationProvider`].
#[derive(Debug)]
pub struct SimulatedProvider {
    events: ProviderEventSender,
    state: Mutex<SimState>,
}

impl SimulatedProvider {
    /// Authorization starts `NotDetermined`; prompts are granted while in use.
    pub fn new(events: ProviderEventSender) -> Self {
        Self {
            events,
            state: Mutex::new(SimState {
                authorization: AuthorizationState::NotDetermined,
                prompt_response: AuthorizationState::GrantedWhileInUse,
                services_enabled: true,
                auto_confirm: true,
                heading_available: true,
                significant_change_available: true,
                start_failures: VecDeque::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Set the initial authorization state without emitting an event.
    pub fn with_authorization(self, state: AuthorizationState) -> Self {
        self.state.lock().authorization = state;
        self
    }

    /// How the simulated user answers permission prompts.
    pub fn with_prompt_response(self, response: AuthorizationState) -> Self {
        self.state.lock().prompt_response = response;
        self
    }

    /// Switch location services off system-wide.
    pub fn with_services_enabled(self, enabled: bool) -> Self {
        self.state.lock().services_enabled = enabled;
        self
    }

    /// Disable automatic start/stop confirmation.
    pub fn with_auto_confirm(self, auto_confirm: bool) -> Self {
        self.state.lock().auto_confirm = auto_confirm;
        self
    }

    /// Simulate a device with or without a compass.
    pub fn with_heading_available(self, available: bool) -> Self {
        self.state.lock().heading_available = available;
        self
    }

    /// Simulate an OS with or without significant-change monitoring.
    pub fn with_significant_change_available(self, available: bool) -> Self {
        self.state.lock().significant_change_available = available;
        self
    }

    /// Make the next `start_updates` call fail with `error`.
    pub fn fail_next_start(&self, error: ProviderError) {
        self.state.lock().start_failures.push_back(error);
    }

    /// Change the authorization state, as if the user edited system settings.
    pub fn set_authorization(&self, state: AuthorizationState) {
        self.state.lock().authorization = state;
        self.emit(ProviderEvent::AuthorizationChanged(state));
    }

    /// Deliver a fix on `tier`'s stream.
    pub fn emit_fix(&self, tier: AccuracyTier, fix: LocationFix) {
        self.emit(ProviderEvent::Fix { tier, fix });
    }

    /// Report an error on `tier`'s stream.
    pub fn emit_error(&self, tier: AccuracyTier, error: ProviderError) {
        self.emit(ProviderEvent::Error { tier, error });
    }

    /// Deliver a compass reading.
    pub fn emit_heading(&self, heading: HeadingReading) {
        self.emit(ProviderEvent::Heading(heading));
    }

    pub fn pause(&self, tier: AccuracyTier) {
        self.emit(ProviderEvent::UpdatesPaused(tier));
    }

    pub fn resume(&self, tier: AccuracyTier) {
        self.emit(ProviderEvent::UpdatesResumed(tier));
    }

    /// Confirm a start manually (auto-confirm off).
    pub fn confirm_started(&self, tier: AccuracyTier) {
        self.emit(ProviderEvent::UpdatesStarted(tier));
    }

    /// Confirm a stop manually (auto-confirm off).
    pub fn confirm_stopped(&self, tier: AccuracyTier) {
        self.emit(ProviderEvent::UpdatesStopped(tier));
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().calls.clone()
    }

    /// Number of `start_updates` calls.
    pub fn start_count(&self) -> usize {
        self.count(|c| matches!(c, ProviderCall::StartUpdates(_)))
    }

    /// Number of `stop_updates` calls.
    pub fn stop_count(&self) -> usize {
        self.count(|c| matches!(c, ProviderCall::StopUpdates(_)))
    }

    /// Whether the heading stream is currently on.
    pub fn heading_running(&self) -> bool {
        let state = self.state.lock();
        state
            .calls
            .iter()
            .rev()
            .find(|c| matches!(c, ProviderCall::StartHeading | ProviderCall::StopHeading))
            .is_some_and(|c| *c == ProviderCall::StartHeading)
    }

    /// Number of permission prompts shown.
    pub fn prompt_count(&self) -> usize {
        self.count(|c| matches!(c, ProviderCall::RequestAuthorization(_)))
    }

    fn count(&self, pred: impl Fn(&ProviderCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn emit(&self, event: ProviderEvent) {
        if self.events.send(event).is_err() {
            debug!("Provider event dropped, service has stopped");
        }
    }
}

impl LocationProvider for SimulatedProvider {
    fn authorization_state(&self) -> AuthorizationState {
        self.state.lock().authorization
    }

    fn location_services_enabled(&self) -> bool {
        self.state.lock().services_enabled
    }

    fn request_authorization(&self, level: PermissionLevel) {
        let answer = {
            let mut state = self.state.lock();
            state.calls.push(ProviderCall::RequestAuthorization(level));
            let answer = match (state.authorization, level) {
                // An upgrade prompt can only improve a while-in-use grant
                (AuthorizationState::GrantedWhileInUse, PermissionLevel::Always)
                    if state.prompt_response != AuthorizationState::GrantedAlways =>
                {
                    AuthorizationState::GrantedWhileInUse
                }
                (AuthorizationState::NotDetermined, _)
                | (AuthorizationState::GrantedWhileInUse, _) => state.prompt_response,
                (current, _) => current,
            };
            state.authorization = answer;
            answer
        };
        self.emit(ProviderEvent::AuthorizationChanged(answer));
    }

    fn start_updates(&self, profile: AccuracyProfile) -> Result<(), ProviderError> {
        let auto_confirm = {
            let mut state = self.state.lock();
            state.calls.push(ProviderCall::StartUpdates(profile));
            if let Some(error) = state.start_failures.pop_front() {
                return Err(error);
            }
            state.auto_confirm
        };
        if auto_confirm {
            self.emit(ProviderEvent::UpdatesStarted(profile.tier));
        }
        Ok(())
    }

    fn stop_updates(&self, tier: AccuracyTier) {
        let auto_confirm = {
            let mut state = self.state.lock();
            state.calls.push(ProviderCall::StopUpdates(tier));
            state.auto_confirm
        };
        if auto_confirm {
            self.emit(ProviderEvent::UpdatesStopped(tier));
        }
    }

    fn heading_available(&self) -> bool {
        self.state.lock().heading_available
    }

    fn significant_change_monitoring_available(&self) -> bool {
        self.state.lock().significant_change_available
    }

    fn start_heading_updates(&self) {
        self.state.lock().calls.push(ProviderCall::StartHeading);
    }

    fn stop_heading_updates(&self) {
        self.state.lock().calls.push(ProviderCall::StopHeading);
    }
}
