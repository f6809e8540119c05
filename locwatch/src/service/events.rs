//! Events delivered to the host application.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::LocationError;
use crate::fix::{HeadingReading, LocationFix};
use crate::permission::AuthorizationState;
use crate::subscription::SubscriptionId;

/// One event on a subscription stream or the service-wide broadcast.
///
/// Serializes with an `event` tag, e.g.
/// `{"event":"error","subscription_id":3,"error":{"kind":"timed_out","message":"..."}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LocationEvent {
    /// A fix that passed the subscription's filter.
    Location {
        subscription_id: SubscriptionId,
        fix: LocationFix,
    },
    /// A failure. `subscription_id` is `None` for service-wide errors.
    Error {
        subscription_id: Option<SubscriptionId>,
        #[serde(serialize_with = "serialize_error")]
        error: LocationError,
    },
    /// Authorization state changed.
    AuthorizationChanged { state: AuthorizationState },
    /// The OS paused updates feeding this subscription.
    UpdatesPaused { subscription_id: SubscriptionId },
    /// The OS resumed updates feeding this subscription.
    UpdatesResumed { subscription_id: SubscriptionId },
    /// A compass reading that passed the subscription's heading filter.
    Heading {
        subscription_id: SubscriptionId,
        heading: HeadingReading,
    },
}

impl LocationEvent {
    /// Subscription this event is addressed to, if any.
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        match self {
            Self::Location {
                subscription_id, ..
            }
            | Self::UpdatesPaused { subscription_id }
            | Self::UpdatesResumed { subscription_id }
            | Self::Heading {
                subscription_id, ..
            } => Some(*subscription_id),
            Self::Error {
                subscription_id, ..
            } => *subscription_id,
            Self::AuthorizationChanged { .. } => None,
        }
    }

    /// The fix, for location events.
    pub fn fix(&self) -> Option<&LocationFix> {
        match self {
            Self::Location { fix, .. } => Some(fix),
            _ => None,
        }
    }

    /// The reading, for heading events.
    pub fn heading(&self) -> Option<&HeadingReading> {
        match self {
            Self::Heading { heading, .. } => Some(heading),
            _ => None,
        }
    }

    /// The error, for error events.
    pub fn error(&self) -> Option<&LocationError> {
        match self {
            Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_location(&self) -> bool {
        matches!(self, Self::Location { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

fn serialize_error<S: Serializer>(error: &LocationError, s: S) -> Result<S::Ok, S::Error> {
    let mut state = s.serialize_struct("LocationError", 2)?;
    state.serialize_field("kind", &error.kind())?;
    state.serialize_field("message", &error.to_string())?;
    state.end()
}
