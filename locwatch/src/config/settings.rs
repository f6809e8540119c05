//! Service-wide settings.

use std::time::Duration;

use crate::fix::AccuracyThresholds;
use crate::permission::PermissionLevel;
use crate::session::RetryPolicy;

/// Default capacity of the service-wide event broadcast.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Settings for a [`LocationService`](crate::service::LocationService).
///
/// Per-subscription behavior lives in
/// [`SubscriptionConfig`](crate::subscription::SubscriptionConfig); this only
/// covers what is shared by every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Worst acceptable accuracy per tier.
    pub accuracy: AccuracyThresholds,
    /// Level requested when a subscription needs a permission prompt.
    pub default_permission_level: PermissionLevel,
    /// Retry policy for transient `start_updates` failures.
    pub start_retry: RetryPolicy,
    /// Capacity of the service-wide event broadcast.
    pub event_channel_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            accuracy: AccuracyThresholds::default(),
            default_permission_level: PermissionLevel::WhileInUse,
            start_retry: RetryPolicy::default(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl ServiceConfig {
    pub fn with_accuracy(mut self, accuracy: AccuracyThresholds) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn with_default_permission_level(mut self, level: PermissionLevel) -> Self {
        self.default_permission_level = level;
        self
    }

    pub fn with_start_retry(mut self, policy: RetryPolicy) -> Self {
        self.start_retry = policy;
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Retry parameters flattened for the `[retry]` section.
    ///
    /// Returns `(max_attempts, initial_delay, max_delay, multiplier)`.
    pub(super) fn retry_parts(&self) -> (u32, Duration, Duration, f64) {
        match &self.start_retry {
            RetryPolicy::None => (1, Duration::ZERO, Duration::ZERO, 1.0),
            RetryPolicy::Fixed {
                max_attempts,
                delay,
            } => (*max_attempts, *delay, *delay, 1.0),
            RetryPolicy::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => (*max_attempts, *initial_delay, *max_delay, *multiplier),
        }
    }
}
