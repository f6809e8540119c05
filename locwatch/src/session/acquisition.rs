//! A single provider update stream for one accuracy tier.

use std::collections::BTreeSet;

use tokio::time::Instant;
use tracing::{debug, info};

use super::state::{SessionState, StopOutcome};
use crate::fix::FixTimestamp;
use crate::service::timers::TimerHandle;
use crate::subscription::{AccuracyTier, SubscriptionId};

/// Live provider stream shared by every subscription bound to it.
///
/// The session never calls the provider itself. Its transition methods return
/// whether the caller must issue `start_updates` / `stop_updates`, which keeps
/// start and stop calls for a tier strictly alternating.
#[derive(Debug)]
pub struct AcquisitionSession {
    tier: AccuracyTier,
    state: SessionState,
    bound: BTreeSet<SubscriptionId>,
    started_at: Option<Instant>,
    restart_after_stop: bool,
    /// Whether the provider accepted the current `start_updates` call.
    start_accepted: bool,
    start_failures: u32,
    retry_timer: Option<TimerHandle>,
    paused: bool,
    last_fix_at: Option<FixTimestamp>,
    fixes_received: u64,
}

impl AcquisitionSession {
    pub fn new(tier: AccuracyTier) -> Self {
        Self {
            tier,
            state: SessionState::Idle,
            bound: BTreeSet::new(),
            started_at: None,
            restart_after_stop: false,
            start_accepted: false,
            start_failures: 0,
            retry_timer: None,
            paused: false,
            last_fix_at: None,
            fixes_received: 0,
        }
    }

    pub fn tier(&self) -> AccuracyTier {
        self.tier
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of bound subscriptions.
    pub fn ref_count(&self) -> usize {
        self.bound.len()
    }

    /// Bound subscription ids in subscription order.
    pub fn bound(&self) -> &BTreeSet<SubscriptionId> {
        &self.bound
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn fixes_received(&self) -> u64 {
        self.fixes_received
    }

    pub fn start_failures(&self) -> u32 {
        self.start_failures
    }

    /// Whether new subscribers may join this session.
    ///
    /// A session that is stopping counts only if a restart is already queued.
    pub fn is_wanted(&self) -> bool {
        self.state.is_live() || (self.state == SessionState::Stopping && self.restart_after_stop)
    }

    pub fn restart_pending(&self) -> bool {
        self.restart_after_stop
    }

    pub fn start_accepted(&self) -> bool {
        self.start_accepted
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_timer.is_some()
    }

    pub fn attach(&mut self, id: SubscriptionId) -> bool {
        self.bound.insert(id)
    }

    /// Remove a subscription. Returns true if it was bound.
    pub fn detach(&mut self, id: SubscriptionId) -> bool {
        self.bound.remove(&id)
    }

    /// Remove and return every bound id.
    pub fn take_bound(&mut self) -> BTreeSet<SubscriptionId> {
        std::mem::take(&mut self.bound)
    }

    /// Request a start. Returns true if the caller must call `start_updates`.
    ///
    /// While stopping, the start is queued until the stop is confirmed.
    pub fn begin_start(&mut self) -> bool {
        match self.state {
            SessionState::Idle => {
                self.state = SessionState::Requesting;
                self.start_accepted = false;
                self.start_failures = 0;
                self.retry_timer = None;
                info!(tier = %self.tier, "Session requesting updates");
                true
            }
            SessionState::Stopping => {
                if !self.restart_after_stop {
                    debug!(tier = %self.tier, "Start queued behind pending stop");
                }
                self.restart_after_stop = true;
                false
            }
            SessionState::Requesting | SessionState::Streaming => false,
        }
    }

    /// The provider accepted `start_updates`.
    pub fn start_succeeded(&mut self) {
        self.start_accepted = true;
        self.retry_timer = None;
    }

    /// `start_updates` failed. Returns the number of failures so far.
    pub fn start_failed(&mut self) -> u32 {
        self.start_accepted = false;
        self.start_failures += 1;
        self.start_failures
    }

    /// Keep the retry timer alive until it fires or the session goes away.
    pub(crate) fn arm_retry(&mut self, timer: TimerHandle) {
        self.retry_timer = Some(timer);
    }

    /// Consume a fired retry timer. Returns false if no retry was pending.
    pub(crate) fn take_retry(&mut self) -> bool {
        self.retry_timer.take().is_some() && self.state == SessionState::Requesting
    }

    /// Requesting → Streaming. Returns true on the transition.
    pub fn confirm_started(&mut self) -> bool {
        if self.state != SessionState::Requesting {
            return false;
        }
        self.state = SessionState::Streaming;
        self.start_accepted = true;
        self.started_at = Some(Instant::now());
        info!(tier = %self.tier, subscribers = self.bound.len(), "Session streaming");
        true
    }

    /// Request a stop. Returns true if the caller must call `stop_updates`.
    ///
    /// Idempotent. While already stopping it only cancels a queued restart.
    pub fn begin_stop(&mut self) -> bool {
        match self.state {
            SessionState::Requesting | SessionState::Streaming => {
                self.state = SessionState::Stopping;
                self.restart_after_stop = false;
                self.paused = false;
                self.retry_timer = None;
                info!(tier = %self.tier, "Session stopping");
                true
            }
            SessionState::Stopping => {
                self.restart_after_stop = false;
                false
            }
            SessionState::Idle => false,
        }
    }

    /// The provider confirmed the stop.
    pub fn confirm_stopped(&mut self) -> StopOutcome {
        if self.state != SessionState::Stopping {
            return StopOutcome::Ignored;
        }
        self.state = SessionState::Idle;
        self.started_at = None;
        self.last_fix_at = None;
        self.start_accepted = false;

        if self.restart_after_stop || !self.bound.is_empty() {
            self.restart_after_stop = false;
            StopOutcome::Restart
        } else {
            info!(tier = %self.tier, "Session idle");
            StopOutcome::Idle
        }
    }

    /// Record a fix timestamp. Returns false if time went backwards.
    pub fn record_fix(&mut self, timestamp: FixTimestamp) -> bool {
        if let Some(last) = self.last_fix_at {
            if timestamp.monotonic < last.monotonic {
                return false;
            }
        }
        self.last_fix_at = Some(timestamp);
        self.fixes_received += 1;
        true
    }

    /// Record a pause or resume. Returns true if the flag changed.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        std::mem::replace(&mut self.paused, paused) != paused
    }
}
