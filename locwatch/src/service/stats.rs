//! Service counters and point-in-time snapshots.
//!
//! ```text
//! service actor ─────► ServiceStats ─────► ServiceSnapshot ─────► tests, CLI
//!                      (actor-owned)      (point-in-time copy)
//! ```

use serde::Serialize;

use crate::permission::{AuthorizationState, PermissionLevel};
use crate::session::SessionSnapshot;

/// Counters maintained by the service actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    /// Fixes received from the provider.
    pub fixes_received: u64,
    /// Location events delivered to subscribers.
    pub fixes_delivered: u64,
    /// Per-subscription filter rejections.
    pub fixes_rejected: u64,
    /// Fixes dropped before filtering (invalid, out of order, no session).
    pub fixes_dropped: u64,
    /// Transient signal losses absorbed.
    pub signal_losses: u64,
    /// `start_updates` retries issued.
    pub start_retries: u64,
    /// Compass readings received from the provider.
    pub headings_received: u64,
    /// Heading events delivered to subscribers.
    pub headings_delivered: u64,
}

/// Point-in-time view of the whole service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSnapshot {
    pub authorization: AuthorizationState,
    /// Level of the permission prompt currently shown, if any.
    pub pending_prompt: Option<PermissionLevel>,
    pub sessions: Vec<SessionSnapshot>,
    /// Whether the compass stream is running.
    pub heading_active: bool,
    pub active_subscriptions: usize,
    pub awaiting_permission: usize,
    pub stats: ServiceStats,
}

impl ServiceSnapshot {
    /// Snapshot of the session for `tier`, if one exists.
    pub fn session(&self, tier: crate::subscription::AccuracyTier) -> Option<&SessionSnapshot> {
        self.sessions.iter().find(|s| s.tier == tier)
    }

    /// True when no session exists, i.e. every tier is Idle.
    pub fn all_idle(&self) -> bool {
        self.sessions.is_empty()
    }
}
