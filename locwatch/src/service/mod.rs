//! Location service.
//!
//! [`LocationService`] is a cloneable handle to a single actor task that owns
//! the permission gate, the acquisition sessions and the subscriber registry.
//! Handles send commands; the provider reports on its own channel; timers
//! post back to the actor. Nothing else touches service state.
//!
//! ```text
//!  LocationService ──commands──▶ ┌─────────────┐ ──start/stop──▶ LocationProvider
//!                                │ ServiceCore │
//!  LocationProvider ──events───▶ │   (actor)   │ ──per-sub────▶ Subscription
//!  timers ──────────internal──▶  └─────────────┘ ──broadcast──▶ events()
//! ```

mod actor;
mod command;
mod events;
mod handle;
mod stats;
pub(crate) mod timers;

pub(crate) use command::Command;
pub use events::LocationEvent;
pub use handle::LocationService;
pub use stats::{ServiceSnapshot, ServiceStats};
