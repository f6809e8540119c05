//! Integration tests for the location service.
//!
//! These drive a real [`LocationService`] actor against a
//! [`SimulatedProvider`] on a paused tokio clock:
//! - Session sharing, tier upgrades and stop/start ordering
//! - Permission prompts, denial and revocation
//! - Per-subscription filtering, one-shot completion and timeouts
//! - Provider errors, start retries and shutdown
//! - Compass headings and significant-change monitoring
//!
//! Run with: `cargo test --test location_service_integration`

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::time::Instant;

use locwatch::config::ServiceConfig;
use locwatch::coord::destination;
use locwatch::provider::{provider_channel, AccuracyProfile, ProviderCall, SimulatedProvider};
use locwatch::session::SessionState;
use locwatch::{
    AccuracyTier, AuthorizationState, FixTimestamp, HeadingReading, LocationError, LocationEvent,
    LocationFix, LocationService, PermissionError, PermissionLevel, ProviderError, Subscription,
    SubscriptionConfig,
};

// ============================================================================
// Helper Functions
// ============================================================================

const ORIGIN: (f64, f64) = (47.3769, 8.5417);

/// Start a service on a simulated provider customized by `configure`.
fn start_service(
    configure: impl FnOnce(SimulatedProvider) -> SimulatedProvider,
) -> (Arc<SimulatedProvider>, LocationService) {
    let (events_tx, events_rx) = provider_channel();
    let provider = Arc::new(configure(SimulatedProvider::new(events_tx)));
    let service = LocationService::start(provider.clone(), events_rx, ServiceConfig::default());
    (provider, service)
}

/// Start a service whose user already granted while-in-use access.
fn start_granted() -> (Arc<SimulatedProvider>, LocationService) {
    start_service(|p| p.with_authorization(AuthorizationState::GrantedWhileInUse))
}

/// Let the actor drain every queued command and provider event.
async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// A fix `meters_north` of the origin, `ms` after the provider epoch.
fn fix_at(ms: u64, meters_north: f64) -> LocationFix {
    let epoch = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    let (lat, lon) = destination(ORIGIN, 0.0, meters_north);
    LocationFix::new(
        lat,
        lon,
        5.0,
        FixTimestamp::from_epoch(epoch, Duration::from_millis(ms)),
    )
}

/// A compass reading `ms` after the provider epoch.
fn heading_at(ms: u64, degrees: f64) -> HeadingReading {
    let epoch = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    HeadingReading::new(
        degrees,
        5.0,
        FixTimestamp::from_epoch(epoch, Duration::from_millis(ms)),
    )
}

/// Every event currently buffered for `subscription`.
fn drain(subscription: &mut Subscription) -> Vec<LocationEvent> {
    std::iter::from_fn(|| subscription.try_recv()).collect()
}

fn location_count(events: &[LocationEvent]) -> usize {
    events.iter().filter(|e| e.is_location()).count()
}

fn profile(tier: AccuracyTier) -> AccuracyProfile {
    AccuracyProfile::for_tier(tier, &ServiceConfig::default().accuracy)
}

// ============================================================================
// Sessions
// ============================================================================

/// Two subscribers on the same tier share one provider stream, which stops
/// only when the last of them leaves.
#[tokio::test(start_paused = true)]
async fn test_same_tier_subscribers_share_one_session() {
    let (provider, service) = start_granted();

    let first = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    let second = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;

    let snapshot = service.snapshot().await.unwrap();
    let session = snapshot.session(AccuracyTier::Best).unwrap();
    assert_eq!(session.ref_count, 2);
    assert_eq!(session.state, SessionState::Streaming);
    assert!(session.streaming_ms.is_some());
    assert_eq!(provider.start_count(), 1, "One provider stream for both");

    service.unsubscribe(first.id());
    settle().await;

    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.session(AccuracyTier::Best).unwrap().ref_count, 1);
    assert_eq!(provider.stop_count(), 0, "Session must outlive the first subscriber");

    second.unsubscribe();
    settle().await;

    assert!(service.snapshot().await.unwrap().all_idle());
    assert_eq!(provider.stop_count(), 1);
}

/// A stricter subscriber upgrades the running coarse session; existing
/// subscribers move to the new tier.
#[tokio::test(start_paused = true)]
async fn test_stricter_subscriber_upgrades_session() {
    let (provider, service) = start_granted();

    let mut coarse = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Balanced))
        .unwrap();
    settle().await;
    let mut fine = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;

    assert_eq!(
        provider.calls(),
        vec![
            ProviderCall::StartUpdates(profile(AccuracyTier::Balanced)),
            ProviderCall::StopUpdates(AccuracyTier::Balanced),
            ProviderCall::StartUpdates(profile(AccuracyTier::Best)),
        ]
    );

    let snapshot = service.snapshot().await.unwrap();
    assert!(snapshot.session(AccuracyTier::Balanced).is_none());
    assert_eq!(snapshot.session(AccuracyTier::Best).unwrap().ref_count, 2);

    provider.emit_fix(AccuracyTier::Best, fix_at(0, 0.0));
    settle().await;

    assert_eq!(location_count(&drain(&mut coarse)), 1);
    assert_eq!(location_count(&drain(&mut fine)), 1);
}

/// A coarse subscriber joins an already running stricter session instead of
/// opening its own.
#[tokio::test(start_paused = true)]
async fn test_coarse_subscriber_joins_stricter_session() {
    let (provider, service) = start_granted();

    let _fine = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    let _coarse = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Low))
        .unwrap();
    settle().await;

    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.sessions.len(), 1);
    assert_eq!(snapshot.session(AccuracyTier::Best).unwrap().ref_count, 2);
    assert_eq!(provider.start_count(), 1);
}

/// A start requested while a stop is unconfirmed waits for the stop.
#[tokio::test(start_paused = true)]
async fn test_restart_waits_for_stop_confirmation() {
    let (provider, service) = start_service(|p| {
        p.with_authorization(AuthorizationState::GrantedWhileInUse)
            .with_auto_confirm(false)
    });

    let first = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;
    provider.confirm_started(AccuracyTier::Best);
    settle().await;

    drop(first);
    settle().await;
    assert_eq!(provider.stop_count(), 1);

    let _second = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;

    let snapshot = service.snapshot().await.unwrap();
    let session = snapshot.session(AccuracyTier::Best).unwrap();
    assert_eq!(session.state, SessionState::Stopping);
    assert!(session.restart_pending);
    assert_eq!(provider.start_count(), 1, "Start must wait for the stop");

    provider.confirm_stopped(AccuracyTier::Best);
    settle().await;
    provider.confirm_started(AccuracyTier::Best);
    settle().await;

    assert_eq!(
        provider.calls(),
        vec![
            ProviderCall::StartUpdates(profile(AccuracyTier::Best)),
            ProviderCall::StopUpdates(AccuracyTier::Best),
            ProviderCall::StartUpdates(profile(AccuracyTier::Best)),
        ]
    );
    let snapshot = service.snapshot().await.unwrap();
    let session = snapshot.session(AccuracyTier::Best).unwrap();
    assert_eq!(session.state, SessionState::Streaming);
    assert_eq!(session.ref_count, 1);
}

// ============================================================================
// Filtering and delivery
// ============================================================================

/// Walking scenario: baseline, too soon, too close, far enough.
#[tokio::test(start_paused = true)]
async fn test_walking_subscriber_receives_two_fixes() {
    let (provider, service) = start_granted();

    let mut subscription = service
        .subscribe(
            SubscriptionConfig::new(AccuracyTier::Best)
                .with_min_distance(50.0)
                .with_min_interval(Duration::from_millis(1000)),
        )
        .unwrap();
    settle().await;

    provider.emit_fix(AccuracyTier::Best, fix_at(0, 0.0));
    provider.emit_fix(AccuracyTier::Best, fix_at(500, 0.0));
    provider.emit_fix(AccuracyTier::Best, fix_at(1500, 10.0));
    provider.emit_fix(AccuracyTier::Best, fix_at(2000, 80.0));
    settle().await;

    let events = drain(&mut subscription);
    assert_eq!(location_count(&events), 2);
    assert_eq!(events[0].fix(), Some(&fix_at(0, 0.0)));
    assert_eq!(events[1].fix(), Some(&fix_at(2000, 80.0)));

    let stats = service.snapshot().await.unwrap().stats;
    assert_eq!(stats.fixes_received, 4);
    assert_eq!(stats.fixes_delivered, 2);
    assert_eq!(stats.fixes_rejected, 2);
}

/// Fixes older than the last one on the session are dropped.
#[tokio::test(start_paused = true)]
async fn test_out_of_order_fix_dropped() {
    let (provider, service) = start_granted();
    let mut subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;

    provider.emit_fix(AccuracyTier::Best, fix_at(2000, 0.0));
    provider.emit_fix(AccuracyTier::Best, fix_at(1000, 100.0));
    settle().await;

    assert_eq!(location_count(&drain(&mut subscription)), 1);
    assert_eq!(service.snapshot().await.unwrap().stats.fixes_dropped, 1);
    assert_eq!(service.last_known_location(), Some(fix_at(2000, 0.0)));
}

/// Once unsubscribe returns, nothing more is delivered, even fixes already
/// buffered for the subscription.
#[tokio::test(start_paused = true)]
async fn test_no_events_after_unsubscribe() {
    let (provider, service) = start_granted();
    let mut subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;

    provider.emit_fix(AccuracyTier::Best, fix_at(0, 0.0));
    settle().await;

    service.unsubscribe(subscription.id());
    assert!(!subscription.is_active());
    assert_eq!(subscription.recv().await, None);

    provider.emit_fix(AccuracyTier::Best, fix_at(1000, 100.0));
    settle().await;
    assert_eq!(subscription.try_recv(), None);
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_forwarded() {
    let (provider, service) = start_granted();
    let mut subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Balanced))
        .unwrap();
    settle().await;

    provider.pause(AccuracyTier::Balanced);
    settle().await;
    assert!(
        service
            .snapshot()
            .await
            .unwrap()
            .session(AccuracyTier::Balanced)
            .unwrap()
            .paused
    );
    provider.resume(AccuracyTier::Balanced);
    settle().await;

    let id = subscription.id();
    assert_eq!(
        drain(&mut subscription),
        vec![
            LocationEvent::UpdatesPaused {
                subscription_id: id
            },
            LocationEvent::UpdatesResumed {
                subscription_id: id
            },
        ]
    );
}

// ============================================================================
// One-shot requests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_one_shot_resolves_with_first_fix() {
    let (provider, service) = start_granted();

    let request = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .request_one_shot_location(SubscriptionConfig::new(AccuracyTier::Balanced))
                .await
        })
    };
    settle().await;

    provider.emit_fix(AccuracyTier::Balanced, fix_at(0, 0.0));
    let fix = request.await.unwrap().unwrap();
    assert_eq!(fix, fix_at(0, 0.0));

    settle().await;
    assert!(service.snapshot().await.unwrap().all_idle());
    assert_eq!(provider.stop_count(), 1);
    assert_eq!(service.last_known_location(), Some(fix));
}

/// No fix ever arrives: the request times out at exactly its deadline.
#[tokio::test(start_paused = true)]
async fn test_one_shot_times_out_at_deadline() {
    let (provider, service) = start_granted();

    let started = Instant::now();
    let result = service
        .request_one_shot_location(
            SubscriptionConfig::new(AccuracyTier::Balanced).with_timeout(Duration::from_millis(5000)),
        )
        .await;

    assert_eq!(result, Err(LocationError::TimedOut));
    assert_eq!(started.elapsed(), Duration::from_millis(5000));

    settle().await;
    assert!(service.snapshot().await.unwrap().all_idle());
    assert_eq!(provider.stop_count(), 1);
}

/// A one-shot timing out on a shared session only releases its own
/// reference; the streaming subscriber keeps receiving fixes.
#[tokio::test(start_paused = true)]
async fn test_one_shot_timeout_leaves_shared_session_running() {
    let (provider, service) = start_granted();
    let mut streamer = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;

    let request = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .request_one_shot_location(
                    SubscriptionConfig::new(AccuracyTier::Best)
                        .with_timeout(Duration::from_millis(5000)),
                )
                .await
        })
    };
    settle().await;

    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.session(AccuracyTier::Best).unwrap().ref_count, 2);

    tokio::time::advance(Duration::from_millis(5001)).await;
    assert_eq!(request.await.unwrap(), Err(LocationError::TimedOut));
    settle().await;

    let snapshot = service.snapshot().await.unwrap();
    let session = snapshot.session(AccuracyTier::Best).unwrap();
    assert_eq!(session.ref_count, 1);
    assert_eq!(session.state, SessionState::Streaming);
    assert_eq!(provider.stop_count(), 0, "Streamer still holds the session");
    assert_eq!(provider.start_count(), 1);

    provider.emit_fix(AccuracyTier::Best, fix_at(6000, 0.0));
    settle().await;

    let events = drain(&mut streamer);
    assert_eq!(location_count(&events), 1);
    assert!(events.iter().all(|e| e.error().is_none()));
}

// ============================================================================
// Permission
// ============================================================================

/// Concurrent requests share a single prompt.
#[tokio::test(start_paused = true)]
async fn test_concurrent_permission_requests_prompt_once() {
    let (provider, service) = start_service(|p| p);

    let (first, second) = tokio::join!(
        service.request_permission(PermissionLevel::WhileInUse),
        service.request_permission(PermissionLevel::WhileInUse),
    );

    assert_eq!(first, Ok(AuthorizationState::GrantedWhileInUse));
    assert_eq!(second, Ok(AuthorizationState::GrantedWhileInUse));
    assert_eq!(provider.prompt_count(), 1);
    assert_eq!(
        service.current_authorization_state(),
        AuthorizationState::GrantedWhileInUse
    );
}

/// Subscribing before permission is decided prompts, then binds on grant.
/// Commands are served before provider events, so a snapshot queued right
/// behind the subscribe sees the prompt still open.
#[tokio::test(start_paused = true)]
async fn test_snapshot_reports_open_prompt() {
    let (_provider, service) = start_service(|p| p);
    let _subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();

    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.pending_prompt, Some(PermissionLevel::WhileInUse));
    assert_eq!(snapshot.awaiting_permission, 1);

    settle().await;
    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.pending_prompt, None);
    assert_eq!(snapshot.awaiting_permission, 0);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_prompts_then_streams() {
    let (provider, service) = start_service(|p| p);
    let mut changes = service.authorization_changes();

    let mut subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;

    assert_eq!(provider.prompt_count(), 1);
    assert_eq!(provider.start_count(), 1);
    assert!(changes.has_changed().unwrap());
    assert_eq!(
        *changes.borrow_and_update(),
        AuthorizationState::GrantedWhileInUse
    );

    provider.emit_fix(AccuracyTier::Best, fix_at(0, 0.0));
    settle().await;

    let events = drain(&mut subscription);
    assert_eq!(
        events[0],
        LocationEvent::AuthorizationChanged {
            state: AuthorizationState::GrantedWhileInUse
        }
    );
    assert_eq!(location_count(&events), 1);
}

#[tokio::test(start_paused = true)]
async fn test_denied_prompt_fails_subscription() {
    let (provider, service) =
        start_service(|p| p.with_prompt_response(AuthorizationState::Denied));

    let mut subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();

    let mut errors = Vec::new();
    while let Some(event) = subscription.recv().await {
        if let LocationEvent::Error { error, .. } = event {
            errors.push(error);
        }
    }
    assert_eq!(
        errors,
        vec![LocationError::Permission(PermissionError::UserDenied)]
    );
    assert_eq!(provider.start_count(), 0);

    // Already refused: resolves with the current state, no second prompt
    assert_eq!(
        service.request_permission(PermissionLevel::WhileInUse).await,
        Ok(AuthorizationState::Denied)
    );
    assert_eq!(provider.prompt_count(), 1);
}

/// Revocation while streaming: one authorization change and one revocation
/// error per subscription, then every session goes idle.
#[tokio::test(start_paused = true)]
async fn test_revocation_while_streaming() {
    let (provider, service) = start_granted();
    let mut broadcast = service.events();

    let mut subscriptions = vec![
        service
            .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
            .unwrap(),
        service
            .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
            .unwrap(),
    ];
    settle().await;

    provider.set_authorization(AuthorizationState::Denied);
    settle().await;

    for subscription in &mut subscriptions {
        let events = drain(subscription);
        assert_eq!(events.len(), 2, "{:?}", events);
        assert_eq!(
            events[0],
            LocationEvent::AuthorizationChanged {
                state: AuthorizationState::Denied
            }
        );
        assert_eq!(events[1].error(), Some(&LocationError::PermissionRevoked));
        assert_eq!(subscription.recv().await, None);
    }

    assert_eq!(
        broadcast.try_recv().unwrap(),
        LocationEvent::AuthorizationChanged {
            state: AuthorizationState::Denied
        }
    );
    assert!(broadcast.try_recv().is_err());

    let snapshot = service.snapshot().await.unwrap();
    assert!(snapshot.all_idle());
    assert_eq!(snapshot.active_subscriptions, 0);
    assert_eq!(provider.stop_count(), 1);
}

// ============================================================================
// Provider failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_retries_then_gives_up() {
    let (provider, service) = start_granted();
    for _ in 0..3 {
        provider.fail_next_start(ProviderError::SignalUnavailable);
    }

    let started = Instant::now();
    let mut subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Low))
        .unwrap();

    let event = subscription.recv().await.unwrap();
    assert_eq!(
        event.error(),
        Some(&LocationError::ProviderUnavailable { attempts: 3 })
    );
    // 100ms then 200ms of backoff
    assert_eq!(started.elapsed(), Duration::from_millis(300));
    assert_eq!(subscription.recv().await, None);

    assert_eq!(provider.start_count(), 3);
    assert_eq!(provider.stop_count(), 0, "Nothing was ever started");
    let snapshot = service.snapshot().await.unwrap();
    assert!(snapshot.all_idle());
    assert_eq!(snapshot.stats.start_retries, 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_recovers_after_transient_failure() {
    let (provider, service) = start_granted();
    provider.fail_next_start(ProviderError::SignalUnavailable);

    let _subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Low))
        .unwrap();
    settle().await;
    tokio::time::advance(Duration::from_millis(100)).await;
    settle().await;

    assert_eq!(provider.start_count(), 2);
    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(
        snapshot.session(AccuracyTier::Low).unwrap().state,
        SessionState::Streaming
    );
}

/// `start_updates` failing on the spot still reaches the subscriber that
/// opened the session, and leaves nothing behind.
#[tokio::test(start_paused = true)]
async fn test_immediate_start_failure_reaches_first_subscriber() {
    let (provider, service) = start_granted();
    provider.fail_next_start(ProviderError::HardwareDisabled);

    let mut subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), subscription.recv())
        .await
        .expect("subscriber must hear about the failure")
        .unwrap();
    assert_eq!(event.error(), Some(&LocationError::HardwareDisabled));
    assert_eq!(subscription.recv().await, None);

    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.active_subscriptions, 0);
    assert!(snapshot.all_idle());
    assert_eq!(provider.start_count(), 1);
    assert_eq!(provider.stop_count(), 0, "Nothing was ever started");

    // The tier is usable again afterwards
    let _retry = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;
    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(
        snapshot.session(AccuracyTier::Best).unwrap().state,
        SessionState::Streaming
    );
}

#[tokio::test(start_paused = true)]
async fn test_immediate_start_failure_resolves_one_shot() {
    let (provider, service) = start_granted();
    provider.fail_next_start(ProviderError::HardwareDisabled);

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        service.request_one_shot_location(SubscriptionConfig::new(AccuracyTier::Low)),
    )
    .await
    .expect("one-shot must resolve");

    assert_eq!(result, Err(LocationError::HardwareDisabled));
    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.active_subscriptions, 0);
    assert!(snapshot.all_idle());
    assert_eq!(provider.stop_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_services_disabled_fails_fast() {
    let (provider, service) = start_service(|p| {
        p.with_authorization(AuthorizationState::GrantedAlways)
            .with_services_enabled(false)
    });
    assert!(!service.location_services_enabled());

    let mut subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();

    let event = subscription.recv().await.unwrap();
    assert_eq!(event.error(), Some(&LocationError::HardwareDisabled));
    assert_eq!(subscription.recv().await, None);
    assert_eq!(provider.start_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_hardware_disabled_mid_stream() {
    let (provider, service) = start_granted();
    let mut broadcast = service.events();
    let mut subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;

    provider.emit_error(AccuracyTier::Best, ProviderError::HardwareDisabled);
    settle().await;

    let events = drain(&mut subscription);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error(), Some(&LocationError::HardwareDisabled));

    let global = broadcast.try_recv().unwrap();
    assert_eq!(global.subscription_id(), None);
    assert_eq!(global.error(), Some(&LocationError::HardwareDisabled));

    assert!(service.snapshot().await.unwrap().all_idle());
    assert_eq!(provider.stop_count(), 1);
}

/// Signal loss is transient: no subscriber sees it.
#[tokio::test(start_paused = true)]
async fn test_signal_loss_is_absorbed() {
    let (provider, service) = start_granted();
    let mut subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;

    provider.emit_error(AccuracyTier::Best, ProviderError::SignalUnavailable);
    provider.emit_fix(AccuracyTier::Best, fix_at(0, 0.0));
    settle().await;

    let events = drain(&mut subscription);
    assert_eq!(events.len(), 1);
    assert!(events[0].is_location());

    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.stats.signal_losses, 1);
    assert_eq!(
        snapshot.session(AccuracyTier::Best).unwrap().state,
        SessionState::Streaming
    );
}

// ============================================================================
// Headings
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_headings_delivered_past_filter() {
    let (provider, service) = start_granted();
    let mut compass = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Balanced).with_heading_filter(10.0))
        .unwrap();
    let mut plain = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Balanced))
        .unwrap();
    settle().await;
    assert!(provider.heading_running());

    provider.emit_heading(heading_at(0, 350.0));
    // Within the filter across north
    provider.emit_heading(heading_at(100, 355.0));
    let mut uncalibrated = heading_at(150, 90.0);
    uncalibrated.accuracy_degrees = -1.0;
    provider.emit_heading(uncalibrated);
    provider.emit_heading(heading_at(200, 5.0));
    settle().await;

    let headings: Vec<_> = drain(&mut compass)
        .iter()
        .filter_map(|e| e.heading().map(|h| h.magnetic_degrees))
        .collect();
    assert_eq!(headings, vec![350.0, 5.0]);
    assert!(drain(&mut plain).is_empty());

    assert_eq!(service.last_known_heading(), Some(heading_at(200, 5.0)));
    let snapshot = service.snapshot().await.unwrap();
    assert!(snapshot.heading_active);
    assert_eq!(snapshot.stats.headings_received, 4);
    assert_eq!(snapshot.stats.headings_delivered, 2);
}

#[tokio::test(start_paused = true)]
async fn test_heading_stream_follows_heading_subscribers() {
    let (provider, service) = start_granted();
    let first = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best).with_heading_filter(1.0))
        .unwrap();
    let second = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Low).with_heading_filter(30.0))
        .unwrap();
    let _plain = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;

    first.unsubscribe();
    settle().await;
    assert!(provider.heading_running());

    second.unsubscribe();
    settle().await;
    assert!(!provider.heading_running());
    assert!(!service.snapshot().await.unwrap().heading_active);

    let heading_calls: Vec<_> = provider
        .calls()
        .into_iter()
        .filter(|c| matches!(c, ProviderCall::StartHeading | ProviderCall::StopHeading))
        .collect();
    assert_eq!(
        heading_calls,
        vec![ProviderCall::StartHeading, ProviderCall::StopHeading]
    );
    assert_eq!(provider.stop_count(), 0, "Location stream still in use");
}

#[tokio::test(start_paused = true)]
async fn test_heading_waits_for_permission() {
    let (provider, service) = start_service(|p| p);
    let _compass = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best).with_heading_filter(5.0))
        .unwrap();

    // Prompt still pending before the actor sees the answer
    assert!(!provider.heading_running());
    settle().await;
    assert!(provider.heading_running());
}

#[tokio::test(start_paused = true)]
async fn test_heading_without_compass_rejected_synchronously() {
    let (provider, service) = start_service(|p| {
        p.with_authorization(AuthorizationState::GrantedAlways)
            .with_heading_available(false)
    });
    assert!(!service.heading_available());

    let result =
        service.subscribe(SubscriptionConfig::new(AccuracyTier::Best).with_heading_filter(5.0));
    assert_eq!(result.err(), Some(LocationError::HeadingUnavailable));

    settle().await;
    assert_eq!(provider.start_count(), 0);
    assert!(!provider.heading_running());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_heading_stream() {
    let (provider, service) = start_granted();
    let _compass = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Low).with_heading_filter(5.0))
        .unwrap();
    settle().await;
    assert!(provider.heading_running());

    service.shutdown().await;
    assert!(!provider.heading_running());
}

// ============================================================================
// Significant-change monitoring
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_significant_change_uses_monitoring() {
    let (provider, service) = start_granted();
    let _subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::SignificantChange))
        .unwrap();
    settle().await;

    assert_eq!(
        provider.calls(),
        vec![ProviderCall::StartUpdates(profile(
            AccuracyTier::SignificantChange
        ))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_significant_change_joins_finer_session() {
    let (provider, service) = start_granted();
    let _balanced = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Balanced))
        .unwrap();
    let mut coarse = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::SignificantChange))
        .unwrap();
    settle().await;

    assert_eq!(provider.start_count(), 1);
    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.session(AccuracyTier::Balanced).unwrap().ref_count, 2);

    provider.emit_fix(AccuracyTier::Balanced, fix_at(0, 0.0));
    settle().await;
    assert_eq!(location_count(&drain(&mut coarse)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_significant_change_falls_back_to_low() {
    let (provider, service) = start_service(|p| {
        p.with_authorization(AuthorizationState::GrantedWhileInUse)
            .with_significant_change_available(false)
    });
    assert!(!service.significant_change_monitoring_available());

    let mut subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::SignificantChange))
        .unwrap();
    settle().await;

    assert_eq!(
        provider.calls(),
        vec![ProviderCall::StartUpdates(profile(AccuracyTier::Low))]
    );
    let snapshot = service.snapshot().await.unwrap();
    assert!(snapshot.session(AccuracyTier::SignificantChange).is_none());
    assert_eq!(snapshot.session(AccuracyTier::Low).unwrap().ref_count, 1);

    provider.emit_fix(AccuracyTier::Low, fix_at(0, 0.0));
    settle().await;
    assert_eq!(location_count(&drain(&mut subscription)), 1);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_streams_and_closes_subscriptions() {
    let (provider, service) = start_granted();
    let mut subscription = service
        .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
        .unwrap();
    settle().await;

    service.shutdown().await;

    assert_eq!(provider.stop_count(), 1);
    assert_eq!(subscription.recv().await, None);
    assert_eq!(
        service
            .subscribe(SubscriptionConfig::new(AccuracyTier::Best))
            .err(),
        Some(LocationError::ServiceStopped)
    );
    assert_eq!(
        service.request_permission(PermissionLevel::Always).await,
        Err(PermissionError::ServiceStopped)
    );
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_rejected_synchronously() {
    let (provider, service) = start_granted();
    let result = service.subscribe(SubscriptionConfig::new(AccuracyTier::Best).with_min_distance(-1.0));

    assert!(matches!(result, Err(LocationError::Config(_))));
    settle().await;
    assert_eq!(provider.start_count(), 0);
}
