//! Per-subscription fix filtering.
//!
//! The filter is a pure decision over `(new fix, last delivered fix, config)`.
//! Filtering is per subscription rather than per session because subscribers
//! sharing one provider stream may want different trade-offs from it.
//!
//! Decision order:
//!
//! 1. No previous delivery → Accept (baseline)
//! 2. Accuracy worse than the tier threshold → Reject
//! 3. Sooner than `min_interval` after the last delivery → Reject
//! 4. Closer than `min_distance_meters` to the last delivery → Reject
//! 5. Otherwise → Accept

use super::model::LocationFix;
use crate::subscription::{AccuracyTier, SubscriptionConfig};

/// Default accuracy threshold for the `Best` tier (meters).
pub const DEFAULT_BEST_METERS: f64 = 10.0;

/// Default accuracy threshold for the `Balanced` tier (meters).
pub const DEFAULT_BALANCED_METERS: f64 = 100.0;

/// Default accuracy threshold for the `Low` tier (meters).
pub const DEFAULT_LOW_METERS: f64 = 1_000.0;

/// Default accuracy threshold for the `SignificantChange` tier (meters).
///
/// Significant-change fixes come from cell and Wi-Fi positioning.
pub const DEFAULT_SIGNIFICANT_CHANGE_METERS: f64 = 3_000.0;

/// Worst acceptable accuracy radius per tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyThresholds {
    pub best: f64,
    pub balanced: f64,
    pub low: f64,
    pub significant_change: f64,
}

impl Default for AccuracyThresholds {
    fn default() -> Self {
        Self {
            best: DEFAULT_BEST_METERS,
            balanced: DEFAULT_BALANCED_METERS,
            low: DEFAULT_LOW_METERS,
            significant_change: DEFAULT_SIGNIFICANT_CHANGE_METERS,
        }
    }
}

impl AccuracyThresholds {
    /// Threshold in meters for a tier.
    pub fn for_tier(&self, tier: AccuracyTier) -> f64 {
        match tier {
            AccuracyTier::Best => self.best,
            AccuracyTier::Balanced => self.balanced,
            AccuracyTier::Low => self.low,
            AccuracyTier::SignificantChange => self.significant_change,
        }
    }

    /// Thresholds must be positive, finite and ordered from strictest to
    /// coarsest tier.
    pub fn is_consistent(&self) -> bool {
        let ordered = [self.best, self.balanced, self.low, self.significant_change];
        ordered.iter().all(|v| v.is_finite() && *v > 0.0)
            && ordered.windows(2).all(|pair| pair[0] <= pair[1])
    }
}

/// Why a fix was withheld from a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Accuracy radius exceeds the tier threshold.
    Accuracy,
    /// Too close to the last delivered fix.
    Distance,
    /// Too soon after the last delivered fix.
    Interval,
}

/// Outcome of filtering one fix for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    Reject(RejectReason),
}

impl FilterDecision {
    #[inline]
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Stateless fix filter parameterized by tier accuracy thresholds.
#[derive(Debug, Clone, Default)]
pub struct FixFilter {
    thresholds: AccuracyThresholds,
}

impl FixFilter {
    /// Create a filter with custom thresholds.
    pub fn new(thresholds: AccuracyThresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds in use.
    pub fn thresholds(&self) -> &AccuracyThresholds {
        &self.thresholds
    }

    /// Decide whether `fix` should be delivered to a subscription.
    pub fn decide(
        &self,
        fix: &LocationFix,
        last_delivered: Option<&LocationFix>,
        config: &SubscriptionConfig,
    ) -> FilterDecision {
        let Some(last) = last_delivered else {
            return FilterDecision::Accept;
        };

        if fix.accuracy_meters > self.thresholds.for_tier(config.desired_accuracy) {
            return FilterDecision::Reject(RejectReason::Accuracy);
        }

        if fix.timestamp.since(&last.timestamp) < config.min_interval {
            return FilterDecision::Reject(RejectReason::Interval);
        }

        if fix.distance_to(last) < config.min_distance_meters {
            return FilterDecision::Reject(RejectReason::Distance);
        }

        FilterDecision::Accept
    }
}
