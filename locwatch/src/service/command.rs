//! Requests from service handles to the actor.

use tokio::sync::oneshot;

use super::stats::ServiceSnapshot;
use crate::permission::{PermissionLevel, PermissionReply};
use crate::subscription::{SubscriptionEntry, SubscriptionId};

#[derive(Debug)]
pub(crate) enum Command {
    /// Register a subscription whose handle was already returned.
    Subscribe(SubscriptionEntry),
    /// Remove a subscription. Unknown ids are ignored.
    Unsubscribe(SubscriptionId),
    RequestPermission {
        level: PermissionLevel,
        reply: PermissionReply,
    },
    Snapshot {
        reply: oneshot::Sender<ServiceSnapshot>,
    },
}
