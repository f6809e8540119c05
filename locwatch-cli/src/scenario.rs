//! Scenario files for `locwatch replay`.
//!
//! A scenario scripts what the simulated OS does: the initial permission
//! state, how the user answers prompts, and a list of steps applied in order.
//!
//! ```json
//! {
//!   "authorization": "granted_while_in_use",
//!   "steps": [
//!     { "step": "fix", "t_ms": 0, "latitude": 47.3769, "longitude": 8.5417, "accuracy": 5 },
//!     { "step": "heading", "t_ms": 100, "magnetic": 92.5 },
//!     { "step": "wait", "ms": 500 },
//!     { "step": "error", "error": "signal_unavailable" },
//!     { "step": "authorization", "state": "denied" }
//!   ]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use locwatch::provider::{ProviderEventSender, SimulatedProvider};
use locwatch::{
    AccuracyTier, AuthorizationState, FixTimestamp, HeadingReading, LocationFix, ProviderError,
};

use crate::error::CliError;

/// Accuracy reported for fixes that do not specify one, in meters.
pub const DEFAULT_FIX_ACCURACY: f64 = 5.0;

/// Accuracy reported for headings that do not specify one, in degrees.
pub const DEFAULT_HEADING_ACCURACY: f64 = 5.0;

/// A scripted provider session.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Scenario {
    /// Authorization state before anything happens.
    #[serde(default)]
    pub authorization: AuthorizationState,

    /// How the simulated user answers a permission prompt.
    #[serde(default = "default_prompt_response")]
    pub prompt_response: AuthorizationState,

    /// Whether location services are switched on.
    #[serde(default = "default_services_enabled")]
    pub services_enabled: bool,

    /// Whether the device has a compass.
    #[serde(default = "default_capability")]
    pub heading_available: bool,

    /// Whether the OS offers significant-change monitoring.
    #[serde(default = "default_capability")]
    pub significant_change_available: bool,

    /// Wall clock time of `t_ms = 0`.
    #[serde(default)]
    pub epoch: Option<DateTime<Utc>>,

    pub steps: Vec<Step>,
}

fn default_prompt_response() -> AuthorizationState {
    AuthorizationState::GrantedWhileInUse
}

fn default_services_enabled() -> bool {
    true
}

fn default_capability() -> bool {
    true
}

fn default_heading_accuracy() -> f64 {
    DEFAULT_HEADING_ACCURACY
}

fn default_accuracy() -> f64 {
    DEFAULT_FIX_ACCURACY
}

/// One scripted provider action.
///
/// `tier` defaults to the tier the replayed subscription asked for.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Report a fix measured `t_ms` after the scenario epoch.
    Fix {
        t_ms: u64,
        latitude: f64,
        longitude: f64,
        #[serde(default = "default_accuracy")]
        accuracy: f64,
        #[serde(default)]
        altitude: Option<f64>,
        #[serde(default)]
        speed: Option<f64>,
        #[serde(default)]
        heading: Option<f64>,
        #[serde(default)]
        tier: Option<AccuracyTier>,
    },
    /// Report a compass reading measured `t_ms` after the scenario epoch.
    Heading {
        t_ms: u64,
        magnetic: f64,
        #[serde(default)]
        true_heading: Option<f64>,
        #[serde(default = "default_heading_accuracy")]
        accuracy: f64,
    },
    /// Report a stream error.
    Error {
        error: StepError,
        #[serde(default)]
        tier: Option<AccuracyTier>,
    },
    /// The user changed the permission in system settings.
    Authorization { state: AuthorizationState },
    Pause {
        #[serde(default)]
        tier: Option<AccuracyTier>,
    },
    Resume {
        #[serde(default)]
        tier: Option<AccuracyTier>,
    },
    /// Let real time pass, e.g. for one-shot timeouts.
    Wait { ms: u64 },
}

/// Provider error named in a scenario.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepError {
    SignalUnavailable,
    HardwareDisabled,
    PermissionRevoked,
}

impl From<StepError> for ProviderError {
    fn from(e: StepError) -> Self {
        match e {
            StepError::SignalUnavailable => ProviderError::SignalUnavailable,
            StepError::HardwareDisabled => ProviderError::HardwareDisabled,
            StepError::PermissionRevoked => ProviderError::PermissionRevoked,
        }
    }
}

impl Scenario {
    /// Read and parse a scenario file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|e| CliError::Scenario {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content).map_err(|e| CliError::Scenario {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Simulated provider in the scenario's initial state.
    pub fn provider(&self, events: ProviderEventSender) -> SimulatedProvider {
        SimulatedProvider::new(events)
            .with_authorization(self.authorization)
            .with_prompt_response(self.prompt_response)
            .with_services_enabled(self.services_enabled)
            .with_heading_available(self.heading_available)
            .with_significant_change_available(self.significant_change_available)
    }

    fn epoch(&self) -> DateTime<Utc> {
        self.epoch.unwrap_or_default()
    }
}

impl Step {
    /// Apply this step to `provider`.
    ///
    /// Returns how long to wait for `Wait` steps; every other step takes
    /// effect immediately.
    pub fn apply(
        &self,
        provider: &SimulatedProvider,
        scenario: &Scenario,
        default_tier: AccuracyTier,
    ) -> Option<Duration> {
        match *self {
            Step::Fix {
                t_ms,
                latitude,
                longitude,
                accuracy,
                altitude,
                speed,
                heading,
                tier,
            } => {
                let timestamp =
                    FixTimestamp::from_epoch(scenario.epoch(), Duration::from_millis(t_ms));
                let mut fix = LocationFix::new(latitude, longitude, accuracy, timestamp);
                fix.altitude = altitude;
                fix.speed = speed;
                fix.heading = heading;
                provider.emit_fix(tier.unwrap_or(default_tier), fix);
            }
            Step::Heading {
                t_ms,
                magnetic,
                true_heading,
                accuracy,
            } => {
                let timestamp =
                    FixTimestamp::from_epoch(scenario.epoch(), Duration::from_millis(t_ms));
                let mut heading = HeadingReading::new(magnetic, accuracy, timestamp);
                heading.true_degrees = true_heading;
                provider.emit_heading(heading);
            }
            Step::Error { error, tier } => {
                if error == StepError::PermissionRevoked {
                    provider.set_authorization(AuthorizationState::Denied);
                }
                provider.emit_error(tier.unwrap_or(default_tier), error.into());
            }
            Step::Authorization { state } => provider.set_authorization(state),
            Step::Pause { tier } => provider.pause(tier.unwrap_or(default_tier)),
            Step::Resume { tier } => provider.resume(tier.unwrap_or(default_tier)),
            Step::Wait { ms } => return Some(Duration::from_millis(ms)),
        }
        None
    }
}
