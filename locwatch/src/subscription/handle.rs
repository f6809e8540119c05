//! Consumer-side subscription handle.
//!
//! A [`Subscription`] is the receiving end of one subscriber's event channel.
//! Unsubscribing (explicitly, through the service, or by dropping the handle)
//! flips a shared liveness flag before anything else happens, so no event is
//! observed afterwards even if it was already buffered in the channel.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::service::{Command, LocationEvent};

/// Opaque, unique subscription token.
///
/// Ids are allocated monotonically, so ordering by id is subscription order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Numeric value, for transports that need one.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Allocates subscription ids. Starts at 1.
#[derive(Debug)]
pub(crate) struct IdAllocator(AtomicU64);

impl IdAllocator {
    pub(crate) fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub(crate) fn next(&self) -> SubscriptionId {
        SubscriptionId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whether a subscription still wants events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionLiveness {
    Active,
    Cancelled,
}

/// Shared cancellation flag between the handle, the service and the registry.
#[derive(Debug, Clone, Default)]
pub(crate) struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Mark cancelled. Returns true if this call performed the transition.
    pub(crate) fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_active(&self) -> bool {
        !self.0.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> SubscriptionLiveness {
        if self.is_active() {
            SubscriptionLiveness::Active
        } else {
            SubscriptionLiveness::Cancelled
        }
    }
}

/// Liveness flags by id, so the service can cancel by id synchronously.
pub(crate) type LivenessTable = Arc<DashMap<SubscriptionId, Liveness>>;

/// A live subscription to location events.
///
/// Receive events with [`Subscription::recv`] or use it as a
/// [`futures::Stream`]. The stream ends when the subscription is cancelled,
/// completes (one-shot), fails fatally, or the service shuts down.
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    events: mpsc::UnboundedReceiver<LocationEvent>,
    liveness: Liveness,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        events: mpsc::UnboundedReceiver<LocationEvent>,
        liveness: Liveness,
        commands: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        Self {
            id,
            events,
            liveness,
            commands,
        }
    }

    /// This subscription's id.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Current liveness.
    pub fn liveness(&self) -> SubscriptionLiveness {
        self.liveness.state()
    }

    /// Returns true until the subscription is cancelled.
    pub fn is_active(&self) -> bool {
        self.liveness.is_active()
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the subscription is cancelled or has ended.
    pub async fn recv(&mut self) -> Option<LocationEvent> {
        if !self.liveness.is_active() {
            return None;
        }
        let event = self.events.recv().await?;
        self.liveness.is_active().then_some(event)
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<LocationEvent> {
        if !self.liveness.is_active() {
            return None;
        }
        let event = self.events.try_recv().ok()?;
        self.liveness.is_active().then_some(event)
    }

    /// Cancel this subscription.
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Stream for Subscription {
    type Item = LocationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if !self.liveness.is_active() {
            return Poll::Ready(None);
        }
        match self.events.poll_recv(cx) {
            Poll::Ready(Some(event)) if self.liveness.is_active() => Poll::Ready(Some(event)),
            Poll::Ready(_) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.liveness.cancel() {
            if let Some(commands) = self.commands.upgrade() {
                let _ = commands.send(Command::Unsubscribe(self.id));
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("liveness", &self.liveness.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::AuthorizationState;

    fn handle() -> (
        Subscription,
        mpsc::UnboundedSender<LocationEvent>,
        mpsc::UnboundedReceiver<Command>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let id = IdAllocator::new().next();
        let sub = Subscription::new(id, event_rx, Liveness::new(), cmd_tx.downgrade());
        // Keep the command channel open past this function
        std::mem::forget(cmd_tx.clone());
        (sub, event_tx, cmd_rx)
    }

    fn auth_event() -> LocationEvent {
        LocationEvent::AuthorizationChanged {
            state: AuthorizationState::GrantedWhileInUse,
        }
    }

    #[test]
    fn test_ids_are_monotonic() {
        let ids = IdAllocator::new();
        let a = ids.next();
        let b = ids.next();
        assert!(a < b);
        assert_eq!(a.value(), 1);
        assert_eq!(a.to_string(), "sub-1");
    }

    #[test]
    fn test_liveness_cancel_once() {
        let liveness = Liveness::new();
        assert!(liveness.is_active());
        assert!(liveness.cancel());
        assert!(!liveness.cancel());
        assert_eq!(liveness.state(), SubscriptionLiveness::Cancelled);
    }

    #[tokio::test]
    async fn test_recv_delivers_buffered_events() {
        let (mut sub, tx, _cmds) = handle();
        tx.send(auth_event()).unwrap();
        assert_eq!(sub.recv().await, Some(auth_event()));
    }

    #[tokio::test]
    async fn test_cancelled_handle_drops_buffered_events() {
        let (mut sub, tx, _cmds) = handle();
        tx.send(auth_event()).unwrap();
        sub.liveness.cancel();
        assert_eq!(sub.recv().await, None);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_drop_sends_unsubscribe() {
        let (sub, _tx, mut cmds) = handle();
        let id = sub.id();
        drop(sub);
        match cmds.recv().await {
            Some(Command::Unsubscribe(got)) => assert_eq!(got, id),
            other => panic!("expected unsubscribe, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_ends_when_sender_closes() {
        use futures::StreamExt;

        let (mut sub, tx, _cmds) = handle();
        tx.send(auth_event()).unwrap();
        drop(tx);
        assert_eq!(sub.next().await, Some(auth_event()));
        assert_eq!(sub.next().await, None);
    }
}
