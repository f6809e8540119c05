//! Compass headings.

use serde::Serialize;

use super::model::FixTimestamp;

/// One compass sample reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadingReading {
    /// Heading relative to magnetic north, in degrees (0-360).
    pub magnetic_degrees: f64,
    /// Heading relative to true north, if the provider has a location to
    /// correct for declination.
    pub true_degrees: Option<f64>,
    /// Maximum deviation from the true heading, in degrees. Negative means
    /// the reading is unusable (e.g. the compass needs calibration).
    pub accuracy_degrees: f64,
    pub timestamp: FixTimestamp,
}

impl HeadingReading {
    pub fn new(magnetic_degrees: f64, accuracy_degrees: f64, timestamp: FixTimestamp) -> Self {
        Self {
            magnetic_degrees,
            true_degrees: None,
            accuracy_degrees,
            timestamp,
        }
    }

    pub fn with_true_heading(mut self, degrees: f64) -> Self {
        self.true_degrees = Some(degrees);
        self
    }

    /// True heading when known, magnetic otherwise.
    pub fn direction(&self) -> f64 {
        self.true_degrees.unwrap_or(self.magnetic_degrees)
    }

    /// Headings in `[0, 360)` with a usable accuracy.
    pub fn is_valid(&self) -> bool {
        let in_range = |d: f64| (0.0..360.0).contains(&d);
        in_range(self.magnetic_degrees)
            && self.true_degrees.map_or(true, in_range)
            && self.accuracy_degrees.is_finite()
            && self.accuracy_degrees >= 0.0
    }

    /// Whether this reading moved at least `filter_degrees` from `last`.
    ///
    /// The first reading always passes.
    pub fn passes_filter(&self, last: Option<&HeadingReading>, filter_degrees: f64) -> bool {
        match last {
            None => true,
            Some(last) => angular_difference(self.direction(), last.direction()) >= filter_degrees,
        }
    }
}

/// Smallest angle between two headings, in degrees (0-180).
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}
