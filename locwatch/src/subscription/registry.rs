//! Actor-owned table of subscribers.
//!
//! The registry holds one [`SubscriptionEntry`] per live subscription, keyed by
//! id. Ids are allocated monotonically, so iterating the `BTreeMap` (or a
//! session's `BTreeSet` of bound ids) yields subscription order.

use std::collections::{BTreeMap, BTreeSet};

use tokio::sync::mpsc;
use tracing::debug;

use super::config::{AccuracyTier, SubscriptionConfig};
use super::handle::{Liveness, SubscriptionId};
use crate::error::LocationError;
use crate::fix::{FilterDecision, FixFilter, HeadingReading, LocationFix};
use crate::permission::AuthorizationState;
use crate::service::timers::TimerHandle;
use crate::service::LocationEvent;

/// Where a subscription stands relative to acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    /// Waiting for a permission prompt to resolve.
    AwaitingPermission,
    /// Attached to the session for this tier.
    Bound(AccuracyTier),
    /// Not attached to any session yet.
    Unbound,
}

/// One subscriber's state, owned by the service actor.
#[derive(Debug)]
pub(crate) struct SubscriptionEntry {
    pub id: SubscriptionId,
    pub config: SubscriptionConfig,
    pub last_delivered: Option<LocationFix>,
    pub last_heading: Option<HeadingReading>,
    pub liveness: Liveness,
    pub binding: Binding,
    /// One-shot deadline; aborted when the entry is dropped.
    pub deadline: Option<TimerHandle>,
    sink: mpsc::UnboundedSender<LocationEvent>,
}

impl SubscriptionEntry {
    pub(crate) fn new(
        id: SubscriptionId,
        config: SubscriptionConfig,
        liveness: Liveness,
        sink: mpsc::UnboundedSender<LocationEvent>,
    ) -> Self {
        Self {
            id,
            config,
            last_delivered: None,
            last_heading: None,
            liveness,
            binding: Binding::Unbound,
            deadline: None,
            sink,
        }
    }

    /// Session tier this entry is attached to, if any.
    pub(crate) fn bound_tier(&self) -> Option<AccuracyTier> {
        match self.binding {
            Binding::Bound(tier) => Some(tier),
            _ => None,
        }
    }

    /// Bound and asking for headings.
    fn wants_heading(&self) -> bool {
        self.bound_tier().is_some() && self.config.heading_filter_degrees.is_some()
    }

    /// Send an event if the subscriber is still active.
    ///
    /// Returns false if the subscriber cancelled or dropped its handle.
    fn emit(&self, event: LocationEvent) -> bool {
        self.liveness.is_active() && self.sink.send(event).is_ok()
    }
}

/// Counters from fanning one fix out to a session's subscribers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct DispatchOutcome {
    pub delivered: usize,
    pub rejected: usize,
    /// One-shot subscriptions that just received their fix.
    pub completed: Vec<SubscriptionId>,
}

/// All live subscriptions.
#[derive(Debug, Default)]
pub(crate) struct SubscriberRegistry {
    entries: BTreeMap<SubscriptionId, SubscriptionEntry>,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, entry: SubscriptionEntry) {
        self.entries.insert(entry.id, entry);
    }

    /// Remove an entry. Dropping the returned entry closes its event channel.
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> Option<SubscriptionEntry> {
        self.entries.remove(&id)
    }

    pub(crate) fn get(&self, id: SubscriptionId) -> Option<&SubscriptionEntry> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: SubscriptionId) -> Option<&mut SubscriptionEntry> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Ids of all entries, in subscription order.
    pub(crate) fn ids(&self) -> Vec<SubscriptionId> {
        self.entries.keys().copied().collect()
    }

    /// Ids of entries waiting on a permission prompt, in subscription order.
    pub(crate) fn awaiting_permission(&self) -> Vec<SubscriptionId> {
        self.entries
            .values()
            .filter(|e| e.binding == Binding::AwaitingPermission)
            .map(|e| e.id)
            .collect()
    }

    /// Ids of entries bound to `tier`, in subscription order.
    pub(crate) fn bound_to(&self, tier: AccuracyTier) -> Vec<SubscriptionId> {
        self.entries
            .values()
            .filter(|e| e.binding == Binding::Bound(tier))
            .map(|e| e.id)
            .collect()
    }

    /// Run the filter for each target and deliver to those that accept.
    pub(crate) fn dispatch_fix(
        &mut self,
        targets: &BTreeSet<SubscriptionId>,
        fix: &LocationFix,
        filter: &FixFilter,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        for id in targets {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            if !entry.liveness.is_active() {
                continue;
            }

            match filter.decide(fix, entry.last_delivered.as_ref(), &entry.config) {
                FilterDecision::Accept => {
                    entry.last_delivered = Some(fix.clone());
                    let delivered = entry.emit(LocationEvent::Location {
                        subscription_id: *id,
                        fix: fix.clone(),
                    });
                    if delivered {
                        outcome.delivered += 1;
                    }
                    if entry.config.one_shot {
                        outcome.completed.push(*id);
                    }
                }
                FilterDecision::Reject(reason) => {
                    debug!(subscription = %id, ?reason, "Fix rejected");
                    outcome.rejected += 1;
                }
            }
        }

        outcome
    }

    /// Whether any bound subscription wants compass headings.
    pub(crate) fn wants_heading(&self) -> bool {
        self.entries.values().any(SubscriptionEntry::wants_heading)
    }

    /// Deliver a heading to every bound subscription whose heading filter
    /// it passes. Returns the number of deliveries.
    pub(crate) fn dispatch_heading(&mut self, heading: &HeadingReading) -> usize {
        let mut delivered = 0;

        for entry in self.entries.values_mut() {
            if !entry.wants_heading() || !entry.liveness.is_active() {
                continue;
            }
            let filter = entry.config.heading_filter_degrees.unwrap_or_default();
            if !heading.passes_filter(entry.last_heading.as_ref(), filter) {
                continue;
            }

            entry.last_heading = Some(heading.clone());
            if entry.emit(LocationEvent::Heading {
                subscription_id: entry.id,
                heading: heading.clone(),
            }) {
                delivered += 1;
            }
        }

        delivered
    }

    /// Send a terminal or informational error to one subscription.
    pub(crate) fn send_error(&self, id: SubscriptionId, error: LocationError) -> bool {
        self.entries.get(&id).is_some_and(|entry| {
            entry.emit(LocationEvent::Error {
                subscription_id: Some(id),
                error,
            })
        })
    }

    /// Send an authorization change to one subscription.
    pub(crate) fn send_authorization(&self, id: SubscriptionId, state: AuthorizationState) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|entry| entry.emit(LocationEvent::AuthorizationChanged { state }))
    }

    /// Send an arbitrary event to one subscription.
    pub(crate) fn send(&self, id: SubscriptionId, event: LocationEvent) -> bool {
        self.entries.get(&id).is_some_and(|entry| entry.emit(event))
    }

    /// Drop every entry, closing all event channels.
    pub(crate) fn clear(&mut self) -> Vec<SubscriptionEntry> {
        std::mem::take(&mut self.entries).into_values().collect()
    }
}
