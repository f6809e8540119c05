//! Location fixes and per-subscription filtering.
//!
//! - [`model`] - `LocationFix` and its monotonic + wall clock timestamp
//! - [`filter`] - `FixFilter`, the pure accept/reject decision applied to every
//!   fix for every bound subscription
//! - [`heading`] - compass readings and the per-subscription heading filter

mod filter;
mod heading;
mod model;

pub use filter::{AccuracyThresholds, FilterDecision, FixFilter, RejectReason};
pub use heading::{angular_difference, HeadingReading};
pub use model::{FixTimestamp, LocationFix};
