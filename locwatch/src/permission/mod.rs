//! Location permission state.
//!
//! [`AuthorizationState`] is owned by a single [`PermissionGate`] inside the
//! service actor. Everything else observes it through a `watch` receiver.

mod gate;
mod state;

pub use gate::{AuthorizationChange, GateDecision, PermissionGate, PermissionReply};
pub use state::{AuthorizationState, PermissionLevel};
