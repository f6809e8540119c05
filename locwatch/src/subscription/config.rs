//! Subscription configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Named accuracy/power profile requested from the provider.
///
/// Ordered from strictest to coarsest:
/// `Best < Balanced < Low < SignificantChange`. A session at a stricter tier
/// can serve subscribers that asked for a coarser one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyTier {
    /// Highest accuracy, highest power draw.
    Best,
    /// Roughly block-level accuracy.
    #[default]
    Balanced,
    /// Roughly city-level accuracy.
    Low,
    /// Only report significant moves (the OS's significant-change
    /// monitoring), lowest power draw.
    SignificantChange,
}

impl AccuracyTier {
    /// All tiers, strictest first.
    pub const ALL: [AccuracyTier; 4] = [
        Self::Best,
        Self::Balanced,
        Self::Low,
        Self::SignificantChange,
    ];

    /// Returns true if a session at this tier satisfies a subscriber that
    /// needs `need`.
    #[inline]
    pub fn covers(&self, need: AccuracyTier) -> bool {
        *self <= need
    }

    /// Returns true if this tier is strictly finer than `other`.
    #[inline]
    pub fn is_stricter_than(&self, other: AccuracyTier) -> bool {
        *self < other
    }
}

impl std::fmt::Display for AccuracyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Best => write!(f, "best"),
            Self::Balanced => write!(f, "balanced"),
            Self::Low => write!(f, "low"),
            Self::SignificantChange => write!(f, "significant_change"),
        }
    }
}

impl std::str::FromStr for AccuracyTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best" => Ok(Self::Best),
            "balanced" => Ok(Self::Balanced),
            "low" => Ok(Self::Low),
            "significant_change" | "significant-change" => Ok(Self::SignificantChange),
            other => Err(format!(
                "unknown accuracy tier '{}', expected best, balanced, low or significant_change",
                other
            )),
        }
    }
}

/// What a subscriber wants from the location stream.
///
/// Immutable for the lifetime of a subscription; re-subscribe to change it.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use locwatch::subscription::{AccuracyTier, SubscriptionConfig};
///
/// let config = SubscriptionConfig::new(AccuracyTier::Best)
///     .with_min_distance(50.0)
///     .with_min_interval(Duration::from_secs(1));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubscriptionConfig {
    /// Accuracy tier the subscriber needs.
    pub desired_accuracy: AccuracyTier,
    /// Minimum movement between delivered fixes, in meters.
    pub min_distance_meters: f64,
    /// Minimum time between delivered fixes.
    pub min_interval: Duration,
    /// One-shot only: give up with `TimedOut` if no fix is accepted in time.
    pub timeout: Option<Duration>,
    /// Resolve after the first accepted fix, then self-terminate.
    pub one_shot: bool,
    /// Deliver compass headings that moved at least this many degrees since
    /// the last one delivered. `None` means no heading events.
    pub heading_filter_degrees: Option<f64>,
}

impl SubscriptionConfig {
    /// Create a continuous subscription config with no distance or interval
    /// constraints.
    pub fn new(desired_accuracy: AccuracyTier) -> Self {
        Self {
            desired_accuracy,
            ..Default::default()
        }
    }

    pub fn with_min_distance(mut self, meters: f64) -> Self {
        self.min_distance_meters = meters;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Also receive compass headings; `0.0` delivers every reading.
    pub fn with_heading_filter(mut self, degrees: f64) -> Self {
        self.heading_filter_degrees = Some(degrees);
        self
    }

    /// Mark as one-shot.
    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    /// Reject configurations that can never be honored.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_distance_meters.is_finite() || self.min_distance_meters < 0.0 {
            return Err(ConfigError::InvalidThreshold {
                field: "min_distance_meters",
                value: self.min_distance_meters.to_string(),
            });
        }
        if let Some(degrees) = self.heading_filter_degrees {
            if !(0.0..=180.0).contains(&degrees) {
                return Err(ConfigError::InvalidThreshold {
                    field: "heading_filter_degrees",
                    value: degrees.to_string(),
                });
            }
            if self.one_shot {
                return Err(ConfigError::Conflict {
                    reason: "one-shot subscriptions cannot receive headings",
                });
            }
        }
        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidThreshold {
                    field: "timeout",
                    value: format!("{}ms", timeout.as_millis()),
                });
            }
        }
        Ok(())
    }
}
