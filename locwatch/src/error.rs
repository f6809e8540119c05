//! Error taxonomy for the location service.
//!
//! Each concern has its own error type:
//!
//! - [`PermissionError`]: outcome of an authorization prompt
//! - [`ProviderError`]: failures reported by the OS location provider
//! - [`ConfigError`]: invalid subscription configuration (rejected synchronously)
//! - [`LocationError`]: what a subscriber or one-shot caller ultimately sees
//!
//! [`ErrorKind`] is the flat, serializable discriminant used on the host
//! event contract.

use serde::Serialize;
use thiserror::Error;

/// Result of a permission request that did not end in a grant.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PermissionError {
    /// The user answered the prompt with "don't allow".
    #[error("location permission denied by user")]
    UserDenied,

    /// Location access is blocked by system policy (parental controls, MDM).
    #[error("location permission restricted by system policy")]
    SystemRestricted,

    /// The service stopped before the request resolved.
    #[error("location service stopped before permission resolved")]
    ServiceStopped,
}

/// Errors reported by the OS location provider.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// No fix could be computed right now. Transient.
    #[error("location signal unavailable")]
    SignalUnavailable,

    /// Location hardware or services are switched off.
    #[error("location hardware disabled")]
    HardwareDisabled,

    /// The provider lost authorization while updating.
    #[error("location permission revoked")]
    PermissionRevoked,
}

impl ProviderError {
    /// Transient errors keep the session streaming and are never surfaced.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SignalUnavailable)
    }
}

/// Invalid subscription configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// A numeric threshold is negative, NaN, infinite or zero where a positive
    /// value is required.
    #[error("invalid threshold for {field}: {value}")]
    InvalidThreshold {
        /// Name of the offending field.
        field: &'static str,
        /// Offending value, rendered for display.
        value: String,
    },

    /// Two options that cannot be combined.
    #[error("conflicting subscription options: {reason}")]
    Conflict { reason: &'static str },
}

/// Terminal error delivered to a subscription or one-shot request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocationError {
    /// Permission was not granted when acquisition was attempted.
    #[error(transparent)]
    Permission(#[from] PermissionError),

    /// Permission was revoked while the subscription was active.
    #[error("location permission revoked")]
    PermissionRevoked,

    /// Location hardware or services are disabled.
    #[error("location hardware disabled")]
    HardwareDisabled,

    /// A one-shot request received no accepted fix before its timeout.
    #[error("timed out waiting for a location fix")]
    TimedOut,

    /// The provider could not start updates after all retry attempts.
    #[error("location provider unavailable after {attempts} start attempts")]
    ProviderUnavailable {
        /// Number of start attempts made.
        attempts: u32,
    },

    /// Headings were requested but the device has no compass.
    #[error("heading updates unavailable on this device")]
    HeadingUnavailable,

    /// The subscription configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The service shut down before the request resolved.
    #[error("location service stopped")]
    ServiceStopped,
}

impl LocationError {
    /// Flat discriminant used on the host event contract.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Permission(PermissionError::UserDenied) => ErrorKind::PermissionDenied,
            Self::Permission(PermissionError::SystemRestricted) => ErrorKind::PermissionRestricted,
            Self::Permission(PermissionError::ServiceStopped) => ErrorKind::ServiceStopped,
            Self::PermissionRevoked => ErrorKind::PermissionRevoked,
            Self::HardwareDisabled => ErrorKind::HardwareDisabled,
            Self::TimedOut => ErrorKind::TimedOut,
            Self::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            Self::HeadingUnavailable => ErrorKind::HeadingUnavailable,
            Self::Config(_) => ErrorKind::InvalidConfig,
            Self::ServiceStopped => ErrorKind::ServiceStopped,
        }
    }
}

impl From<ProviderError> for LocationError {
    fn from(e: ProviderError) -> Self {
        match e {
            // Only reaches subscribers once start retries are exhausted.
            ProviderError::SignalUnavailable => Self::ProviderUnavailable { attempts: 1 },
            ProviderError::HardwareDisabled => Self::HardwareDisabled,
            ProviderError::PermissionRevoked => Self::PermissionRevoked,
        }
    }
}

/// Error kind as exposed to the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PermissionDenied,
    PermissionRestricted,
    PermissionRevoked,
    HardwareDisabled,
    TimedOut,
    ProviderUnavailable,
    HeadingUnavailable,
    InvalidConfig,
    ServiceStopped,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::PermissionDenied => "permission_denied",
            Self::PermissionRestricted => "permission_restricted",
            Self::PermissionRevoked => "permission_revoked",
            Self::HardwareDisabled => "hardware_disabled",
            Self::TimedOut => "timed_out",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::HeadingUnavailable => "heading_unavailable",
            Self::InvalidConfig => "invalid_config",
            Self::ServiceStopped => "service_stopped",
        };
        f.write_str(name)
    }
}
