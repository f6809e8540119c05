//! Subscribers and their configuration.
//!
//! - [`SubscriptionConfig`] / [`AccuracyTier`]: what a subscriber asks for
//! - [`Subscription`]: the consumer-side event stream
//! - `SubscriberRegistry`: the actor-side table that fans filtered fixes out

mod config;
mod handle;
mod registry;

pub use config::{AccuracyTier, SubscriptionConfig};
pub use handle::{Subscription, SubscriptionId, SubscriptionLiveness};

pub(crate) use handle::{IdAllocator, Liveness, LivenessTable};
pub(crate) use registry::{Binding, SubscriberRegistry, SubscriptionEntry};
