//! Permission gate.
//!
//! Owns the cached [`AuthorizationState`] and mediates permission prompts. The
//! gate is a plain state machine driven by the service actor: it never talks
//! to the provider itself, it tells the caller when a prompt must be shown.
//!
//! Prompt rules:
//!
//! - `NotDetermined`: one prompt; concurrent requests join it
//! - `Denied` / `RestrictedByPolicy`: resolve with the current state, no prompt
//! - granted at the requested level: resolve with the current state
//! - `GrantedWhileInUse` asking for `Always`: a single upgrade prompt, after
//!   which requests resolve with the current state

use tokio::sync::{oneshot, watch};
use tracing::{debug, info};

use super::state::{AuthorizationState, PermissionLevel};
use crate::error::PermissionError;

/// Reply channel for a permission request.
pub type PermissionReply = oneshot::Sender<Result<AuthorizationState, PermissionError>>;

/// What the caller must do after [`PermissionGate::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Answered from the cached state; any waiter has already been replied to.
    Resolved(Result<AuthorizationState, PermissionError>),
    /// A new prompt must be shown for this level.
    PromptRequired(PermissionLevel),
    /// A prompt is already pending; the waiter was queued behind it.
    Joined,
}

/// A state transition observed by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationChange {
    pub previous: AuthorizationState,
    pub current: AuthorizationState,
}

impl AuthorizationChange {
    /// Access was granted before and is not any more.
    pub fn is_revocation(&self) -> bool {
        self.previous.allows_acquisition() && !self.current.allows_acquisition()
    }

    /// Access was not granted before and is now.
    pub fn is_grant(&self) -> bool {
        !self.previous.allows_acquisition() && self.current.allows_acquisition()
    }
}

#[derive(Debug)]
struct PendingPrompt {
    level: PermissionLevel,
    waiters: Vec<PermissionReply>,
}

/// Single owner of authorization state.
#[derive(Debug)]
pub struct PermissionGate {
    state: AuthorizationState,
    observer: watch::Sender<AuthorizationState>,
    pending: Option<PendingPrompt>,
    upgrade_prompted: bool,
}

impl PermissionGate {
    /// Create a gate seeded with the provider's current state.
    pub fn new(initial: AuthorizationState) -> Self {
        let (observer, _) = watch::channel(initial);
        Self {
            state: initial,
            observer,
            pending: None,
            upgrade_prompted: false,
        }
    }

    /// Cached authorization state.
    pub fn current_state(&self) -> AuthorizationState {
        self.state
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthorizationState> {
        self.observer.subscribe()
    }

    /// Level of the prompt currently shown, if any.
    pub fn pending_prompt(&self) -> Option<PermissionLevel> {
        self.pending.as_ref().map(|p| p.level)
    }

    /// Request `level`. `waiter` receives the outcome, now or when the prompt
    /// resolves.
    pub fn request(
        &mut self,
        level: PermissionLevel,
        waiter: Option<PermissionReply>,
    ) -> GateDecision {
        if self.state.satisfies(level) {
            return self.resolve_now(Ok(self.state), waiter);
        }

        if let Some(pending) = self.pending.as_mut() {
            debug!(%level, "Joining pending permission prompt");
            pending.waiters.extend(waiter);
            return GateDecision::Joined;
        }

        match self.state {
            AuthorizationState::Denied | AuthorizationState::RestrictedByPolicy => {
                self.resolve_now(Ok(self.state), waiter)
            }
            AuthorizationState::NotDetermined => self.open_prompt(level, waiter),
            AuthorizationState::GrantedWhileInUse if !self.upgrade_prompted => {
                self.upgrade_prompted = true;
                self.open_prompt(level, waiter)
            }
            AuthorizationState::GrantedWhileInUse | AuthorizationState::GrantedAlways => {
                self.resolve_now(Ok(self.state), waiter)
            }
        }
    }

    /// Record a state reported by the provider.
    ///
    /// Resolves a pending prompt once the state is no longer `NotDetermined`.
    /// Returns the transition if the state actually changed.
    pub fn apply_authorization(&mut self, state: AuthorizationState) -> Option<AuthorizationChange> {
        let previous = self.state;
        self.state = state;

        if state != AuthorizationState::NotDetermined {
            if let Some(pending) = self.pending.take() {
                let outcome = prompt_outcome(state);
                debug!(
                    level = %pending.level,
                    waiters = pending.waiters.len(),
                    %state,
                    "Permission prompt resolved"
                );
                for waiter in pending.waiters {
                    let _ = waiter.send(outcome);
                }
            }
        }

        if previous == state {
            return None;
        }

        info!(%previous, current = %state, "Authorization changed");
        self.observer.send_replace(state);
        Some(AuthorizationChange {
            previous,
            current: state,
        })
    }

    /// Drop all pending waiters. They observe `ServiceStopped`.
    pub fn abandon_pending(&mut self) {
        self.pending = None;
    }

    fn open_prompt(&mut self, level: PermissionLevel, waiter: Option<PermissionReply>) -> GateDecision {
        info!(%level, state = %self.state, "Requesting location permission");
        self.pending = Some(PendingPrompt {
            level,
            waiters: waiter.into_iter().collect(),
        });
        GateDecision::PromptRequired(level)
    }

    fn resolve_now(
        &self,
        outcome: Result<AuthorizationState, PermissionError>,
        waiter: Option<PermissionReply>,
    ) -> GateDecision {
        if let Some(waiter) = waiter {
            let _ = waiter.send(outcome);
        }
        GateDecision::Resolved(outcome)
    }
}

fn prompt_outcome(state: AuthorizationState) -> Result<AuthorizationState, PermissionError> {
    match state {
        AuthorizationState::Denied => Err(PermissionError::UserDenied),
        AuthorizationState::RestrictedByPolicy => Err(PermissionError::SystemRestricted),
        other => Ok(other),
    }
}
