//! Public service handle.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::actor::{LastKnown, ServiceCore};
use super::command::Command;
use super::events::LocationEvent;
use super::stats::ServiceSnapshot;
use crate::config::ServiceConfig;
use crate::error::{LocationError, PermissionError};
use crate::fix::{HeadingReading, LocationFix};
use crate::permission::{AuthorizationState, PermissionGate, PermissionLevel};
use crate::provider::{LocationProvider, ProviderEventReceiver};
use crate::subscription::{
    IdAllocator, Liveness, LivenessTable, Subscription, SubscriptionConfig, SubscriptionEntry,
    SubscriptionId,
};

struct Inner {
    commands: mpsc::UnboundedSender<Command>,
    ids: IdAllocator,
    liveness: LivenessTable,
    authorization: watch::Receiver<AuthorizationState>,
    events: broadcast::Sender<LocationEvent>,
    last_known: Arc<LastKnown>,
    provider: Arc<dyn LocationProvider>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Entry point for location permission, subscriptions and one-shot requests.
///
/// Cheap to clone; all clones talk to the same service actor. The actor stops
/// when [`shutdown`](Self::shutdown) is called or the last clone is dropped.
///
/// # Example
///
/// ```ignore
/// let (events_tx, events_rx) = provider_channel();
/// let provider = Arc::new(SimulatedProvider::new(events_tx));
/// let service = LocationService::start(provider, events_rx, ServiceConfig::default());
///
/// let fix = service
///     .request_one_shot_location(
///         SubscriptionConfig::new(AccuracyTier::Balanced).with_timeout(Duration::from_secs(5)),
///     )
///     .await?;
/// ```
#[derive(Clone)]
pub struct LocationService {
    inner: Arc<Inner>,
}

impl LocationService {
    /// Spawn the service actor on the current tokio runtime.
    ///
    /// `provider_events` must be the receiver paired with the sender the
    /// provider reports on.
    pub fn start(
        provider: Arc<dyn LocationProvider>,
        provider_events: ProviderEventReceiver,
        config: ServiceConfig,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let gate = PermissionGate::new(provider.authorization_state());
        let authorization = gate.subscribe();
        let liveness = LivenessTable::default();
        let last_known = Arc::new(LastKnown::default());
        let shutdown = CancellationToken::new();

        let core = ServiceCore::new(
            Arc::clone(&provider),
            config,
            gate,
            Arc::clone(&liveness),
            events.clone(),
            Arc::clone(&last_known),
            internal_tx,
        );
        let task = tokio::spawn(core.run(
            commands_rx,
            provider_events,
            internal_rx,
            shutdown.clone(),
        ));

        Self {
            inner: Arc::new(Inner {
                commands: commands_tx,
                ids: IdAllocator::new(),
                liveness,
                authorization,
                events,
                last_known,
                provider,
                shutdown,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Subscribe to location events.
    ///
    /// The configuration is validated before anything else happens. The
    /// handle is returned immediately; acquisition (and a permission prompt,
    /// if needed) starts asynchronously.
    ///
    /// `timeout` only applies to one-shot subscriptions. Asking for headings
    /// on a device without a compass fails with
    /// [`LocationError::HeadingUnavailable`].
    pub fn subscribe(&self, config: SubscriptionConfig) -> Result<Subscription, LocationError> {
        config.validate()?;
        if config.heading_filter_degrees.is_some() && !self.inner.provider.heading_available() {
            return Err(LocationError::HeadingUnavailable);
        }

        let id = self.inner.ids.next();
        let (sink, events) = mpsc::unbounded_channel();
        let liveness = Liveness::new();
        self.inner.liveness.insert(id, liveness.clone());

        let entry = SubscriptionEntry::new(id, config, liveness.clone(), sink);
        if self.inner.commands.send(Command::Subscribe(entry)).is_err() {
            self.inner.liveness.remove(&id);
            return Err(LocationError::ServiceStopped);
        }

        debug!(subscription = %id, "Subscription created");
        Ok(Subscription::new(
            id,
            events,
            liveness,
            self.inner.commands.downgrade(),
        ))
    }

    /// Cancel a subscription by id.
    ///
    /// Takes effect immediately: the handle yields nothing further, even for
    /// events already buffered. Unknown or finished ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some((_, liveness)) = self.inner.liveness.remove(&id) {
            if liveness.cancel() {
                let _ = self.inner.commands.send(Command::Unsubscribe(id));
            }
        }
    }

    /// Ask for location permission at `level`.
    ///
    /// Prompts at most once per the OS rules; see
    /// [`PermissionGate`](crate::permission::PermissionGate).
    pub async fn request_permission(
        &self,
        level: PermissionLevel,
    ) -> Result<AuthorizationState, PermissionError> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .commands
            .send(Command::RequestPermission { level, reply })
            .map_err(|_| PermissionError::ServiceStopped)?;
        rx.await.unwrap_or(Err(PermissionError::ServiceStopped))
    }

    /// Cached authorization state. Never blocks.
    pub fn current_authorization_state(&self) -> AuthorizationState {
        *self.inner.authorization.borrow()
    }

    /// Observe authorization changes.
    pub fn authorization_changes(&self) -> watch::Receiver<AuthorizationState> {
        self.inner.authorization.clone()
    }

    /// Resolve with the first accepted fix, or the error that ended the
    /// request.
    ///
    /// The configuration is forced to one-shot without headings. Pass a
    /// `timeout` to bound the wait.
    pub async fn request_one_shot_location(
        &self,
        config: SubscriptionConfig,
    ) -> Result<LocationFix, LocationError> {
        let mut subscription = self.subscribe(SubscriptionConfig {
            one_shot: true,
            heading_filter_degrees: None,
            ..config
        })?;

        while let Some(event) = subscription.recv().await {
            match event {
                LocationEvent::Location { fix, .. } => return Ok(fix),
                LocationEvent::Error { error, .. } => return Err(error),
                _ => continue,
            }
        }
        Err(LocationError::ServiceStopped)
    }

    /// Service-wide events: authorization changes and session failures.
    pub fn events(&self) -> broadcast::Receiver<LocationEvent> {
        self.inner.events.subscribe()
    }

    /// Most recent valid fix seen on any session.
    pub fn last_known_location(&self) -> Option<LocationFix> {
        self.inner.last_known.location.read().clone()
    }

    /// Most recent usable compass reading, while headings are being received.
    pub fn last_known_heading(&self) -> Option<HeadingReading> {
        self.inner.last_known.heading.read().clone()
    }

    /// Whether the device can report compass headings.
    pub fn heading_available(&self) -> bool {
        self.inner.provider.heading_available()
    }

    /// Whether the OS offers significant-change monitoring. Without it,
    /// [`AccuracyTier::SignificantChange`](crate::subscription::AccuracyTier)
    /// subscriptions are served by a low-accuracy stream.
    pub fn significant_change_monitoring_available(&self) -> bool {
        self.inner.provider.significant_change_monitoring_available()
    }

    /// Whether location services are switched on system-wide.
    pub fn location_services_enabled(&self) -> bool {
        self.inner.provider.location_services_enabled()
    }

    /// Point-in-time view of sessions, subscriptions and counters.
    pub async fn snapshot(&self) -> Result<ServiceSnapshot, LocationError> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .commands
            .send(Command::Snapshot { reply })
            .map_err(|_| LocationError::ServiceStopped)?;
        rx.await.map_err(|_| LocationError::ServiceStopped)
    }

    /// Stop every provider stream, close every subscription and wait for the
    /// actor to exit.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Location service task ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for LocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationService")
            .field("authorization", &self.current_authorization_state())
            .field("subscriptions", &self.inner.liveness.len())
            .finish()
    }
}
