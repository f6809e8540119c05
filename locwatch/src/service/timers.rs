//! Actor timers.
//!
//! Deadlines and retry delays are spawned sleeps that post an
//! [`InternalEvent`] back into the actor. The returned [`TimerHandle`] aborts
//! the sleep when dropped, so a timer owned by a subscription or session dies
//! with it. Events that still slip through are checked against current state.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::subscription::{AccuracyTier, SubscriptionId};

/// Timer expiry delivered to the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InternalEvent {
    /// A one-shot subscription's timeout elapsed.
    DeadlineElapsed(SubscriptionId),
    /// Time to retry `start_updates` for a tier.
    RetryStart(AccuracyTier),
}

pub(crate) type InternalSender = mpsc::UnboundedSender<InternalEvent>;

/// Aborts the timer task on drop.
#[derive(Debug)]
pub(crate) struct TimerHandle(AbortHandle);

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Post `event` to `tx` after `delay`.
pub(crate) fn schedule(tx: &InternalSender, delay: Duration, event: InternalEvent) -> TimerHandle {
    let tx = tx.clone();
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(event);
    });
    TimerHandle(task.abort_handle())
}
