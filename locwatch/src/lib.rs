//! locwatch - Device location service layer
//!
//! This library sits between an application and the operating system's
//! location subsystem. It manages location-permission state, starts and stops
//! continuous or one-shot acquisition, filters raw fixes per subscriber, and
//! delivers location, error and authorization events in a well-defined order.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        LocationService                           │
//! │                                                                  │
//! │  subscribe ──┐                                                   │
//! │  unsubscribe ├──► command channel ──┐                            │
//! │  permission ─┘                      ▼                            │
//! │                             ┌───────────────┐                    │
//! │  LocationProvider ─events─► │  service actor│                    │
//! │        ▲                    │  ├ PermissionGate                  │
//! │        │ start/stop         │  ├ SessionTable (per tier)         │
//! │        └────────────────────│  └ SubscriberRegistry ─► FixFilter │
//! │                             └───────┬───────┘                    │
//! │                                     ▼                            │
//! │                       per-subscription event channels            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use locwatch::provider::{provider_channel, SimulatedProvider};
//! use locwatch::service::LocationService;
//! use locwatch::subscription::{AccuracyTier, SubscriptionConfig};
//!
//! let (events_tx, events_rx) = provider_channel();
//! let provider = Arc::new(SimulatedProvider::new(events_tx));
//! let service = LocationService::start(provider, events_rx, Default::default());
//!
//! let mut subscription = service.subscribe(SubscriptionConfig::new(AccuracyTier::Best))?;
//! while let Some(event) = subscription.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod config;
pub mod coord;
pub mod error;
pub mod fix;
pub mod logging;
pub mod permission;
pub mod provider;
pub mod service;
pub mod session;
pub mod subscription;

pub use error::{ConfigError, ErrorKind, LocationError, PermissionError, ProviderError};
pub use fix::{FixTimestamp, HeadingReading, LocationFix};
pub use permission::{AuthorizationState, PermissionLevel};
pub use service::{LocationEvent, LocationService};
pub use subscription::{AccuracyTier, Subscription, SubscriptionConfig, SubscriptionId};
