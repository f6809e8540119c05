//! The service actor.
//!
//! One task owns every piece of mutable state: the permission gate, the
//! session table and the subscriber registry. It reacts to three inputs:
//!
//! ```text
//!  commands (API)  ──┐
//!  provider events ──┼──► ServiceCore::run ──► per-subscription channels
//!  timers          ──┘                     └─► service-wide broadcast
//! ```
//!
//! Because nothing else touches the state, permission changes, fixes and
//! subscribe/unsubscribe requests are applied strictly one at a time.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::command::Command;
use super::events::LocationEvent;
use super::stats::{ServiceSnapshot, ServiceStats};
use super::timers::{self, InternalEvent, InternalSender};
use crate::config::ServiceConfig;
use crate::error::{LocationError, PermissionError, ProviderError};
use crate::fix::{FixFilter, HeadingReading, LocationFix};
use crate::permission::{
    AuthorizationState, GateDecision, PermissionGate, PermissionLevel, PermissionReply,
};
use crate::provider::{AccuracyProfile, LocationProvider, ProviderEvent, ProviderEventReceiver};
use crate::session::{SessionState, SessionTable, StopOutcome};
use crate::subscription::{
    AccuracyTier, Binding, LivenessTable, SubscriberRegistry, SubscriptionEntry, SubscriptionId,
};

/// Latest readings, written by the actor and read by service handles.
#[derive(Debug, Default)]
pub(crate) struct LastKnown {
    pub location: RwLock<Option<LocationFix>>,
    pub heading: RwLock<Option<HeadingReading>>,
}

pub(crate) struct ServiceCore {
    provider: Arc<dyn LocationProvider>,
    config: ServiceConfig,
    filter: FixFilter,
    gate: PermissionGate,
    sessions: SessionTable,
    registry: SubscriberRegistry,
    liveness: LivenessTable,
    events: broadcast::Sender<LocationEvent>,
    last_known: Arc<LastKnown>,
    internal_tx: InternalSender,
    stats: ServiceStats,
    heading_active: bool,
}

impl ServiceCore {
    pub(crate) fn new(
        provider: Arc<dyn LocationProvider>,
        config: ServiceConfig,
        gate: PermissionGate,
        liveness: LivenessTable,
        events: broadcast::Sender<LocationEvent>,
        last_known: Arc<LastKnown>,
        internal_tx: InternalSender,
    ) -> Self {
        Self {
            provider,
            filter: FixFilter::new(config.accuracy),
            config,
            gate,
            sessions: SessionTable::new(),
            registry: SubscriberRegistry::new(),
            liveness,
            events,
            last_known,
            internal_tx,
            stats: ServiceStats::default(),
            heading_active: false,
        }
    }

    /// Run until shutdown is requested or every service handle is dropped.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut provider_events: ProviderEventReceiver,
        mut internal_rx: mpsc::UnboundedReceiver<InternalEvent>,
        shutdown: CancellationToken,
    ) {
        info!(
            authorization = %self.gate.current_state(),
            "Location service starting"
        );
        let mut provider_open = true;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Location service shutting down");
                    break;
                }

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("All service handles dropped");
                        break;
                    }
                },

                event = provider_events.recv(), if provider_open => match event {
                    Some(event) => self.handle_provider_event(event),
                    None => {
                        warn!("Provider event channel closed");
                        provider_open = false;
                    }
                },

                Some(event) = internal_rx.recv() => self.handle_internal(event),
            }
        }

        self.release_all();
        info!("Location service stopped");
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe(entry) => self.subscribe(entry),
            Command::Unsubscribe(id) => self.unsubscribe(id),
            Command::RequestPermission { level, reply } => self.request_permission(level, reply),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn subscribe(&mut self, entry: SubscriptionEntry) {
        let id = entry.id;
        let deadline = if entry.config.one_shot {
            entry.config.timeout
        } else {
            None
        };
        debug!(
            subscription = %id,
            tier = %entry.config.desired_accuracy,
            one_shot = entry.config.one_shot,
            "Subscription registered"
        );
        self.registry.insert(entry);

        if !self.provider.location_services_enabled() {
            self.fail(id, LocationError::HardwareDisabled);
            return;
        }

        if let Some(timeout) = deadline {
            let timer = timers::schedule(
                &self.internal_tx,
                timeout,
                InternalEvent::DeadlineElapsed(id),
            );
            if let Some(entry) = self.registry.get_mut(id) {
                entry.deadline = Some(timer);
            }
        }

        match self.gate.current_state() {
            AuthorizationState::GrantedWhileInUse | AuthorizationState::GrantedAlways => {
                self.bind(id)
            }
            AuthorizationState::NotDetermined => {
                if let Some(entry) = self.registry.get_mut(id) {
                    entry.binding = Binding::AwaitingPermission;
                }
                let level = self.config.default_permission_level;
                if let GateDecision::PromptRequired(level) = self.gate.request(level, None) {
                    self.provider.request_authorization(level);
                }
            }
            AuthorizationState::Denied => {
                self.fail(id, PermissionError::UserDenied.into());
            }
            AuthorizationState::RestrictedByPolicy => {
                self.fail(id, PermissionError::SystemRestricted.into());
            }
        }
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        if let Some(entry) = self.registry.get(id) {
            entry.liveness.cancel();
            debug!(subscription = %id, "Unsubscribed");
        }
        self.terminate(id);
    }

    fn request_permission(&mut self, level: PermissionLevel, reply: PermissionReply) {
        if let GateDecision::PromptRequired(level) = self.gate.request(level, Some(reply)) {
            self.provider.request_authorization(level);
        }
    }

    fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            authorization: self.gate.current_state(),
            pending_prompt: self.gate.pending_prompt(),
            sessions: self.sessions.snapshot(),
            heading_active: self.heading_active,
            active_subscriptions: self.registry.len(),
            awaiting_permission: self.registry.awaiting_permission().len(),
            stats: self.stats.clone(),
        }
    }

    // =========================================================================
    // Provider events
    // =========================================================================

    fn handle_provider_event(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::AuthorizationChanged(state) => self.handle_authorization(state),
            ProviderEvent::UpdatesStarted(tier) => {
                let confirmed = self
                    .sessions
                    .get_mut(tier)
                    .is_some_and(|session| session.confirm_started());
                if !confirmed {
                    debug!(%tier, "Ignoring stale start confirmation");
                }
            }
            ProviderEvent::UpdatesStopped(tier) => self.handle_stopped(tier),
            ProviderEvent::Fix { tier, fix } => self.handle_fix(tier, fix),
            ProviderEvent::Error { tier, error } => self.handle_provider_error(tier, error),
            ProviderEvent::UpdatesPaused(tier) => self.set_paused(tier, true),
            ProviderEvent::UpdatesResumed(tier) => self.set_paused(tier, false),
            ProviderEvent::Heading(heading) => self.handle_heading(heading),
        }
    }

    fn handle_authorization(&mut self, state: AuthorizationState) {
        if let Some(change) = self.gate.apply_authorization(state) {
            let _ = self.events.send(LocationEvent::AuthorizationChanged { state });
            for id in self.registry.ids() {
                self.registry.send_authorization(id, state);
            }

            if change.is_grant() {
                info!(previous = %change.previous, current = %state, "Location permission granted");
            }
            if change.is_revocation() {
                warn!(previous = %change.previous, current = %state, "Location permission revoked");
                for tier in self.sessions.tiers() {
                    self.terminate_bound(tier, &LocationError::PermissionRevoked);
                    self.stop_session(tier);
                }
            }
        }

        self.settle_awaiting(state);
    }

    /// Bind or fail subscriptions that were waiting on a prompt.
    fn settle_awaiting(&mut self, state: AuthorizationState) {
        let waiting = self.registry.awaiting_permission();
        if waiting.is_empty() {
            return;
        }

        let refusal = match state {
            AuthorizationState::NotDetermined => return,
            AuthorizationState::GrantedWhileInUse | AuthorizationState::GrantedAlways => None,
            AuthorizationState::Denied => Some(PermissionError::UserDenied),
            AuthorizationState::RestrictedByPolicy => Some(PermissionError::SystemRestricted),
        };

        for id in waiting {
            match refusal {
                None => self.bind(id),
                Some(error) => self.fail(id, error.into()),
            }
        }
    }

    fn handle_stopped(&mut self, tier: AccuracyTier) {
        let Some(session) = self.sessions.get_mut(tier) else {
            debug!(%tier, "Stop confirmation for unknown session");
            return;
        };

        match session.confirm_stopped() {
            StopOutcome::Restart => {
                if session.begin_start() {
                    self.issue_start(tier);
                }
            }
            StopOutcome::Idle => {
                self.sessions.remove(tier);
            }
            StopOutcome::Ignored => {
                debug!(%tier, state = %session.state(), "Ignoring stale stop confirmation");
            }
        }
    }

    fn handle_fix(&mut self, tier: AccuracyTier, fix: LocationFix) {
        self.stats.fixes_received += 1;

        if !fix.is_valid() {
            warn!(
                %tier,
                latitude = fix.latitude,
                longitude = fix.longitude,
                accuracy = fix.accuracy_meters,
                "Dropping invalid fix"
            );
            self.stats.fixes_dropped += 1;
            return;
        }

        let Some(session) = self.sessions.get_mut(tier) else {
            debug!(%tier, "Dropping fix for idle tier");
            self.stats.fixes_dropped += 1;
            return;
        };

        match session.state() {
            SessionState::Idle | SessionState::Stopping => {
                debug!(%tier, "Dropping fix for stopping session");
                self.stats.fixes_dropped += 1;
                return;
            }
            // A fix is an implicit start confirmation
            SessionState::Requesting => {
                session.confirm_started();
            }
            SessionState::Streaming => {}
        }

        if !session.record_fix(fix.timestamp) {
            warn!(
                %tier,
                monotonic_ms = fix.timestamp.monotonic.as_millis() as u64,
                "Dropping out-of-order fix"
            );
            self.stats.fixes_dropped += 1;
            return;
        }

        let targets = session.bound().clone();
        *self.last_known.location.write() = Some(fix.clone());

        let outcome = self.registry.dispatch_fix(&targets, &fix, &self.filter);
        self.stats.fixes_delivered += outcome.delivered as u64;
        self.stats.fixes_rejected += outcome.rejected as u64;
        debug!(
            %tier,
            delivered = outcome.delivered,
            rejected = outcome.rejected,
            "Fix dispatched"
        );

        for id in outcome.completed {
            debug!(subscription = %id, "One-shot complete");
            self.terminate(id);
        }
    }

    fn handle_provider_error(&mut self, tier: AccuracyTier, error: ProviderError) {
        if error.is_transient() {
            self.stats.signal_losses += 1;
            debug!(%tier, %error, "Transient provider error, waiting for next fix");
            return;
        }

        if error == ProviderError::PermissionRevoked {
            self.handle_provider_revocation();
            return;
        }

        warn!(%tier, %error, "Fatal provider error");
        self.fail_session(tier, error.into());
    }

    fn handle_heading(&mut self, heading: HeadingReading) {
        self.stats.headings_received += 1;

        if !self.heading_active {
            debug!("Dropping heading, no heading subscribers");
            return;
        }
        if !heading.is_valid() {
            debug!(
                magnetic = heading.magnetic_degrees,
                accuracy = heading.accuracy_degrees,
                "Dropping unusable heading"
            );
            return;
        }

        *self.last_known.heading.write() = Some(heading.clone());
        let delivered = self.registry.dispatch_heading(&heading);
        self.stats.headings_delivered += delivered as u64;
    }

    /// The provider says access is gone; route it through the gate.
    fn handle_provider_revocation(&mut self) {
        let reported = self.provider.authorization_state();
        let state = if reported.allows_acquisition() {
            AuthorizationState::Denied
        } else {
            reported
        };
        warn!(%reported, applied = %state, "Provider reported permission revoked");
        self.handle_authorization(state);
    }

    fn set_paused(&mut self, tier: AccuracyTier, paused: bool) {
        let Some(session) = self.sessions.get_mut(tier) else {
            return;
        };
        if !session.set_paused(paused) {
            return;
        }
        info!(%tier, paused, "Provider updates paused state changed");

        for &id in session.bound() {
            let event = if paused {
                LocationEvent::UpdatesPaused {
                    subscription_id: id,
                }
            } else {
                LocationEvent::UpdatesResumed {
                    subscription_id: id,
                }
            };
            self.registry.send(id, event);
        }
    }

    // =========================================================================
    // Timers
    // =========================================================================

    fn handle_internal(&mut self, event: InternalEvent) {
        match event {
            InternalEvent::DeadlineElapsed(id) => {
                if self.registry.get(id).is_some() {
                    info!(subscription = %id, "One-shot timed out");
                    self.fail(id, LocationError::TimedOut);
                }
            }
            InternalEvent::RetryStart(tier) => {
                let due = self
                    .sessions
                    .get_mut(tier)
                    .is_some_and(|session| session.take_retry());
                if due {
                    self.issue_start(tier);
                }
            }
        }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Attach a subscription to a session that covers its tier.
    fn bind(&mut self, id: SubscriptionId) {
        let Some(mut need) = self.registry.get(id).map(|e| e.config.desired_accuracy) else {
            return;
        };
        if need == AccuracyTier::SignificantChange
            && !self.provider.significant_change_monitoring_available()
        {
            debug!(subscription = %id, "Significant-change monitoring unavailable, using low tier");
            need = AccuracyTier::Low;
        }

        match self.sessions.serving(need) {
            Some(tier) => {
                self.sessions.entry(tier).attach(id);
                self.mark_bound(id, tier);
                debug!(subscription = %id, %need, %tier, "Subscription joined session");
            }
            None => self.open_session(need, id),
        }
        self.sync_heading();
    }

    /// Run the heading stream exactly while a bound subscription wants it.
    fn sync_heading(&mut self) {
        let wanted = self.registry.wants_heading();
        if wanted == self.heading_active {
            return;
        }
        self.heading_active = wanted;
        if wanted {
            info!("Starting heading updates");
            self.provider.start_heading_updates();
        } else {
            info!("Stopping heading updates");
            self.provider.stop_heading_updates();
        }
    }

    fn mark_bound(&mut self, id: SubscriptionId, tier: AccuracyTier) {
        if let Some(entry) = self.registry.get_mut(id) {
            entry.binding = Binding::Bound(tier);
        }
    }

    /// Start (or queue a restart of) the session for `tier` and migrate
    /// subscribers of coarser sessions onto it.
    ///
    /// `first` is bound before the provider is called, so a start that fails
    /// on the spot still reaches it.
    fn open_session(&mut self, tier: AccuracyTier, first: SubscriptionId) {
        let session = self.sessions.entry(tier);
        session.attach(first);
        let must_start = session.begin_start();
        self.mark_bound(first, tier);
        debug!(subscription = %first, %tier, "Subscription opened session");

        for coarse in self.sessions.coarser_wanted(tier) {
            let moved = self
                .sessions
                .get_mut(coarse)
                .map(|s| s.take_bound())
                .unwrap_or_default();
            info!(from = %coarse, to = %tier, subscribers = moved.len(), "Upgrading session tier");

            for id in moved {
                self.sessions.entry(tier).attach(id);
                self.mark_bound(id, tier);
            }
            self.stop_session(coarse);
        }

        if must_start {
            self.issue_start(tier);
        }
    }

    fn issue_start(&mut self, tier: AccuracyTier) {
        let profile = AccuracyProfile::for_tier(tier, self.filter.thresholds());
        match self.provider.start_updates(profile) {
            Ok(()) => {
                if let Some(session) = self.sessions.get_mut(tier) {
                    session.start_succeeded();
                }
            }
            Err(error) => self.handle_start_failure(tier, error),
        }
    }

    fn handle_start_failure(&mut self, tier: AccuracyTier, error: ProviderError) {
        match error {
            ProviderError::SignalUnavailable => {
                let failures = match self.sessions.get_mut(tier) {
                    Some(session) => session.start_failed(),
                    None => return,
                };

                match self.config.start_retry.delay_for_attempt(failures) {
                    Some(delay) => {
                        warn!(%tier, failures, delay_ms = delay.as_millis() as u64, "Start failed, retrying");
                        let timer = timers::schedule(
                            &self.internal_tx,
                            delay,
                            InternalEvent::RetryStart(tier),
                        );
                        if let Some(session) = self.sessions.get_mut(tier) {
                            session.arm_retry(timer);
                        }
                        self.stats.start_retries += 1;
                    }
                    None => {
                        warn!(%tier, attempts = failures, "Start failed, giving up");
                        self.fail_session(
                            tier,
                            LocationError::ProviderUnavailable { attempts: failures },
                        );
                    }
                }
            }
            ProviderError::HardwareDisabled => {
                warn!(%tier, "Start failed, location hardware disabled");
                self.fail_session(tier, LocationError::HardwareDisabled);
            }
            ProviderError::PermissionRevoked => self.handle_provider_revocation(),
        }
    }

    /// Stop a session. Sessions whose start was never accepted are dropped
    /// without a provider call.
    fn stop_session(&mut self, tier: AccuracyTier) {
        let Some(session) = self.sessions.get_mut(tier) else {
            return;
        };

        if session.state() == SessionState::Requesting && !session.start_accepted() {
            info!(%tier, "Abandoning session before start was accepted");
            self.sessions.remove(tier);
            return;
        }

        if session.begin_stop() {
            self.provider.stop_updates(tier);
        }
    }

    /// Fatal session error: report it service-wide and to every bound
    /// subscription, then tear the session down.
    fn fail_session(&mut self, tier: AccuracyTier, error: LocationError) {
        let _ = self.events.send(LocationEvent::Error {
            subscription_id: None,
            error: error.clone(),
        });
        self.terminate_bound(tier, &error);
        self.stop_session(tier);
    }

    fn terminate_bound(&mut self, tier: AccuracyTier, error: &LocationError) {
        for id in self.registry.bound_to(tier) {
            self.fail(id, error.clone());
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Deliver a terminal error, then end the subscription.
    fn fail(&mut self, id: SubscriptionId, error: LocationError) {
        info!(subscription = %id, kind = %error.kind(), "Subscription failed: {}", error);
        self.registry.send_error(id, error);
        self.terminate(id);
    }

    /// Remove a subscription and release its session reference.
    ///
    /// Dropping the entry closes the event channel; events already sent stay
    /// readable unless the consumer cancelled.
    fn terminate(&mut self, id: SubscriptionId) {
        let Some(entry) = self.registry.remove(id) else {
            return;
        };
        self.liveness.remove(&id);

        if let Some(tier) = entry.bound_tier() {
            let now_empty = self
                .sessions
                .get_mut(tier)
                .is_some_and(|s| s.detach(id) && s.ref_count() == 0);
            if now_empty {
                self.stop_session(tier);
            }
        }
        self.sync_heading();
    }

    /// Stop every live stream and close every subscription.
    fn release_all(&mut self) {
        for tier in self.sessions.live_tiers() {
            info!(%tier, "Stopping updates on shutdown");
            self.provider.stop_updates(tier);
        }
        self.sessions.clear();
        if std::mem::take(&mut self.heading_active) {
            self.provider.stop_heading_updates();
        }

        for entry in self.registry.clear() {
            self.liveness.remove(&entry.id);
        }
        self.gate.abandon_pending();
    }
}

impl Drop for ServiceCore {
    fn drop(&mut self) {
        // Only non-empty if the actor panicked or was aborted
        for tier in self.sessions.live_tiers() {
            warn!(%tier, "Stopping orphaned provider stream");
            self.provider.stop_updates(tier);
        }
        if self.heading_active {
            warn!("Stopping orphaned heading stream");
            self.provider.stop_heading_updates();
        }
    }
}
