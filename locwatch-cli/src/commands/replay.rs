//! Replay command - drive the location service from a scenario file.
//!
//! Subscribes once with the configuration given on the command line, applies
//! each scenario step to a simulated provider and writes every event the
//! subscription receives as one JSON line on stdout. Logs go to stderr and the
//! log file.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use locwatch::config::ServiceConfig;
use locwatch::logging::{default_log_file, init_logging};
use locwatch::provider::provider_channel;
use locwatch::service::ServiceSnapshot;
use locwatch::{AccuracyTier, LocationService, Subscription, SubscriptionConfig};

use super::common::{load_service_config, TierArg};
use crate::error::CliError;
use crate::scenario::Scenario;

/// Arguments for the replay command.
pub struct ReplayArgs {
    pub scenario: PathBuf,
    pub config: Option<PathBuf>,
    pub accuracy: TierArg,
    pub min_distance: f64,
    pub min_interval_ms: u64,
    pub heading_filter: Option<f64>,
    pub timeout_ms: Option<u64>,
    pub one_shot: bool,
    pub log_dir: PathBuf,
    pub summary: bool,
}

impl ReplayArgs {
    fn subscription_config(&self) -> SubscriptionConfig {
        let mut config = SubscriptionConfig::new(AccuracyTier::from(self.accuracy))
            .with_min_distance(self.min_distance)
            .with_min_interval(Duration::from_millis(self.min_interval_ms));
        if let Some(degrees) = self.heading_filter {
            config = config.with_heading_filter(degrees);
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        if self.one_shot {
            config = config.one_shot();
        }
        config
    }
}

/// Outcome of a replay.
#[derive(Debug)]
pub struct ReplayReport {
    /// Events written to the output.
    pub events: usize,
    /// Service state after the last step, before shutdown.
    pub snapshot: ServiceSnapshot,
}

/// Run the replay command.
pub fn run(args: ReplayArgs) -> Result<(), CliError> {
    let service_config = load_service_config(args.config.as_deref())?;
    let _logging = init_logging(&args.log_dir, default_log_file())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;
    let scenario = Scenario::load(&args.scenario)?;

    info!(
        scenario = %args.scenario.display(),
        steps = scenario.steps.len(),
        tier = %AccuracyTier::from(args.accuracy),
        "Replaying scenario"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let report = runtime.block_on(replay(
        &scenario,
        args.subscription_config(),
        service_config,
        &mut out,
    ))?;

    info!(
        events = report.events,
        fixes_delivered = report.snapshot.stats.fixes_delivered,
        fixes_rejected = report.snapshot.stats.fixes_rejected,
        headings_delivered = report.snapshot.stats.headings_delivered,
        "Replay finished"
    );

    if args.summary {
        write_json(&mut out, &report.snapshot)?;
    }
    Ok(())
}

/// Replay `scenario` against a fresh service, writing events to `out`.
pub async fn replay<W: Write>(
    scenario: &Scenario,
    subscription_config: SubscriptionConfig,
    service_config: ServiceConfig,
    out: &mut W,
) -> Result<ReplayReport, CliError> {
    let (events_tx, events_rx) = provider_channel();
    let provider = Arc::new(scenario.provider(events_tx));
    let service = LocationService::start(provider.clone(), events_rx, service_config);

    let tier = match subscription_config.desired_accuracy {
        AccuracyTier::SignificantChange if !service.significant_change_monitoring_available() => {
            AccuracyTier::Low
        }
        tier => tier,
    };
    let mut subscription = service.subscribe(subscription_config)?;
    let mut written = 0;

    settle().await;
    written += write_pending(&mut subscription, out)?;

    for step in &scenario.steps {
        if let Some(delay) = step.apply(&provider, scenario, tier) {
            tokio::time::sleep(delay).await;
        }
        settle().await;
        written += write_pending(&mut subscription, out)?;
    }

    let snapshot = service.snapshot().await?;
    service.shutdown().await;
    while let Some(event) = subscription.recv().await {
        write_json(out, &event)?;
        written += 1;
    }

    Ok(ReplayReport {
        events: written,
        snapshot,
    })
}

/// Give the service actor a chance to drain everything queued so far.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn write_pending<W: Write>(
    subscription: &mut Subscription,
    out: &mut W,
) -> Result<usize, CliError> {
    let mut count = 0;
    while let Some(event) = subscription.try_recv() {
        write_json(out, &event)?;
        count += 1;
    }
    Ok(count)
}

fn write_json<W: Write, T: serde::Serialize>(out: &mut W, value: &T) -> Result<(), CliError> {
    serde_json::to_writer(&mut *out, value).map_err(|e| CliError::Output(e.into()))?;
    writeln!(out).map_err(CliError::Output)
}
