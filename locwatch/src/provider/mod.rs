//! Boundary to the operating system's location subsystem.
//!
//! The OS API is modeled as two halves:
//!
//! - [`LocationProvider`]: synchronous calls the service makes
//!   (request permission, start/stop location updates, start/stop headings)
//! - [`ProviderEvent`]: everything the OS reports back, delivered on an
//!   unbounded channel created with [`provider_channel`]
//!
//! Calls never block waiting for the OS. Their outcome arrives later as an
//! event: `request_authorization` is answered by `AuthorizationChanged`,
//! `start_updates` by `UpdatesStarted`, `stop_updates` by `UpdatesStopped`.
//! A provider must answer every authorization request, even when the state
//! did not change.
//!
//! `start_updates` for [`AccuracyTier::SignificantChange`] maps to the OS's
//! significant-change monitoring rather than continuous updates. Headings are
//! a separate stream with no confirmation events.

mod simulated;

use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::fix::{AccuracyThresholds, HeadingReading, LocationFix};
use crate::permission::{AuthorizationState, PermissionLevel};
use crate::subscription::AccuracyTier;

pub use simulated::{ProviderCall, SimulatedProvider};

/// Sender half of the provider event channel.
pub type ProviderEventSender = mpsc::UnboundedSender<ProviderEvent>;

/// Receiver half of the provider event channel, consumed by the service.
pub type ProviderEventReceiver = mpsc::UnboundedReceiver<ProviderEvent>;

/// Create the channel a provider reports on.
pub fn provider_channel() -> (ProviderEventSender, ProviderEventReceiver) {
    mpsc::unbounded_channel()
}

/// Parameters handed to the OS when starting updates for a tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyProfile {
    /// Tier the updates are for; echoed back on every event.
    pub tier: AccuracyTier,
    /// Accuracy the OS should aim for, in meters.
    pub desired_accuracy_meters: f64,
}

impl AccuracyProfile {
    /// Profile for `tier` using the configured thresholds.
    pub fn for_tier(tier: AccuracyTier, thresholds: &AccuracyThresholds) -> Self {
        Self {
            tier,
            desired_accuracy_meters: thresholds.for_tier(tier),
        }
    }
}

/// Something the OS reported.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// Authorization state, in answer to a request or after a settings change.
    AuthorizationChanged(AuthorizationState),
    /// Updates for the tier are running.
    UpdatesStarted(AccuracyTier),
    /// Updates for the tier have stopped.
    UpdatesStopped(AccuracyTier),
    /// A new position sample.
    Fix { tier: AccuracyTier, fix: LocationFix },
    /// The stream for the tier reported a failure.
    Error {
        tier: AccuracyTier,
        error: ProviderError,
    },
    /// The OS paused updates for the tier (e.g. the device is stationary).
    UpdatesPaused(AccuracyTier),
    /// The OS resumed paused updates.
    UpdatesResumed(AccuracyTier),
    /// A new compass sample.
    Heading(HeadingReading),
}

/// The OS location API.
///
/// Implementations must be cheap to call from the service actor. Anything
/// slow happens out of band and is reported through [`ProviderEvent`]s.
pub trait LocationProvider: Send + Sync + 'static {
    /// Authorization state as the OS sees it right now.
    fn authorization_state(&self) -> AuthorizationState;

    /// Whether location services are switched on system-wide.
    fn location_services_enabled(&self) -> bool {
        true
    }

    /// Show the permission prompt for `level`.
    fn request_authorization(&self, level: PermissionLevel);

    /// Begin delivering fixes for `profile.tier`.
    fn start_updates(&self, profile: AccuracyProfile) -> Result<(), ProviderError>;

    /// Stop delivering fixes for `tier`.
    fn stop_updates(&self, tier: AccuracyTier);

    /// Whether the device can report compass headings.
    fn heading_available(&self) -> bool {
        false
    }

    /// Whether the OS offers significant-change monitoring.
    fn significant_change_monitoring_available(&self) -> bool {
        false
    }

    /// Begin delivering [`ProviderEvent::Heading`]s.
    fn start_heading_updates(&self) {}

    /// Stop delivering headings.
    fn stop_heading_updates(&self) {}
}
