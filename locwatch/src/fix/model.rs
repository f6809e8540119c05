//! Core data types for location fixes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::coord;

/// When a fix was measured.
///
/// `monotonic` is the time since an arbitrary provider epoch and is what all
/// interval arithmetic uses. `wall` is informational and may jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FixTimestamp {
    /// Monotonic time since the provider's epoch.
    #[serde(rename = "monotonic_ms", serialize_with = "serialize_millis")]
    pub monotonic: Duration,
    /// Wall clock time of the measurement.
    pub wall: DateTime<Utc>,
}

impl FixTimestamp {
    /// Create a timestamp from both clocks.
    pub fn new(monotonic: Duration, wall: DateTime<Utc>) -> Self {
        Self { monotonic, wall }
    }

    /// Create a timestamp whose wall clock is derived from `epoch + monotonic`.
    ///
    /// Used by simulated providers that only track elapsed time.
    pub fn from_epoch(epoch: DateTime<Utc>, monotonic: Duration) -> Self {
        let wall = chrono::Duration::from_std(monotonic)
            .ok()
            .and_then(|offset| epoch.checked_add_signed(offset))
            .unwrap_or(epoch);
        Self { monotonic, wall }
    }

    /// Monotonic time elapsed since `earlier`, saturating at zero.
    pub fn since(&self, earlier: &FixTimestamp) -> Duration {
        self.monotonic.saturating_sub(earlier.monotonic)
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// A single position sample reported by the provider.
///
/// Immutable once produced. Use [`LocationFix::is_valid`] before trusting
/// provider data; the service drops invalid fixes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationFix {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Altitude in meters above WGS84, if known.
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters (lower is better).
    pub accuracy_meters: f64,
    /// Ground speed in meters per second, if known.
    pub speed: Option<f64>,
    /// Course over ground in degrees (0-360), if known.
    pub heading: Option<f64>,
    /// When the fix was measured.
    pub timestamp: FixTimestamp,
}

impl LocationFix {
    /// Create a fix with position and accuracy only.
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64, timestamp: FixTimestamp) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy_meters,
            speed: None,
            heading: None,
            timestamp,
        }
    }

    /// Set the altitude in meters.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Set the ground speed in meters per second.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Set the course over ground in degrees.
    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Position as (latitude, longitude).
    #[inline]
    pub fn position(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// Great-circle distance to another fix in meters.
    pub fn distance_to(&self, other: &LocationFix) -> f64 {
        coord::distance_meters(self.position(), other.position())
    }

    /// Check the fix invariants: coordinates in range, accuracy finite and
    /// non-negative.
    pub fn is_valid(&self) -> bool {
        coord::validate(self.latitude, self.longitude).is_ok()
            && self.accuracy_meters.is_finite()
            && self.accuracy_meters >= 0.0
    }
}
