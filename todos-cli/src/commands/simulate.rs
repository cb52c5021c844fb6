//! `todos simulate`: exercise one dependency through the resilience layer

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::time::Duration;

use todos_config::TodosConfig;
use todos_resilience::{CallContext, CircuitSnapshot};
use todos_store::{
    establish, BroadcastPublisher, FaultInjector, InMemoryConnector, InMemoryStore, LogEvent,
    Operation, ResilientPublisher, ResilientStore, StoreError,
};

use crate::cli::DependencyKind;

/// Parameters of one simulation run
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub calls: u32,
    pub failure_rate: f64,
    pub dependency: DependencyKind,
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

/// Outcome counts of a simulation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationReport {
    pub dependency: String,
    pub succeeded: u32,
    /// Rejected by an open breaker without reaching the backend
    pub rejected: u32,
    /// Failed after the whole retry sequence
    pub exhausted: u32,
    /// Abandoned at the per-call deadline
    pub timed_out: u32,
    pub backend_calls: u64,
    pub injected_failures: u64,
    #[serde(skip)]
    pub snapshots: Vec<(String, CircuitSnapshot)>,
}

impl SimulationReport {
    fn record(&mut self, outcome: Result<(), StoreError>) {
        match outcome {
            Ok(()) => self.succeeded += 1,
            Err(StoreError::CircuitOpen(_)) => self.rejected += 1,
            Err(StoreError::Cancelled { .. }) => self.timed_out += 1,
            Err(_) => self.exhausted += 1,
        }
    }
}

fn call_context(timeout: Option<Duration>) -> CallContext {
    match timeout {
        Some(timeout) => CallContext::new().with_timeout(timeout),
        None => CallContext::new(),
    }
}

/// Run the simulation described by `options` against `config`
pub async fn run_simulation(
    config: &TodosConfig,
    options: &SimulateOptions,
) -> Result<SimulationReport> {
    let mut registry = config.resilience.build_registry();
    let dependency = registry.get_or_default(options.dependency.name()).clone();
    let mut report = SimulationReport {
        dependency: dependency.name().to_string(),
        ..SimulationReport::default()
    };

    info!(
        "Simulating {} calls to '{}' with failure rate {:.2}",
        options.calls,
        dependency.name(),
        options.failure_rate
    );

    match options.dependency {
        DependencyKind::Store => {
            let connector = InMemoryConnector::new(
                InMemoryStore::<String, u32>::new(),
                config.store.address(),
            );
            let backend = establish(&config.resilience.reconnect, &connector)
                .await
                .context("Failed to connect to store")?;
            let store = ResilientStore::new(
                FaultInjector::new(backend, options.failure_rate),
                dependency,
            );

            for call in 0..options.calls {
                let ctx = call_context(options.timeout);
                let outcome = store.put_with(&ctx, format!("todo-{}", call), call).await;
                report.record(outcome);
                pace(call, options).await;
            }

            report.backend_calls = store.inner().calls();
            report.injected_failures = store.inner().injected_failures();
        }
        DependencyKind::Publisher => {
            let publisher = ResilientPublisher::new(
                FaultInjector::new(BroadcastPublisher::default(), options.failure_rate),
                dependency,
                config.store.log_channel.clone(),
            );

            for call in 0..options.calls {
                let ctx = call_context(options.timeout);
                let event = LogEvent::new(Operation::Create, "simulator", call);
                let outcome = publisher
                    .publish_with(&ctx, publisher.channel(), &event)
                    .await
                    .map(|_| ());
                report.record(outcome);
                pace(call, options).await;
            }

            report.backend_calls = publisher.inner().calls();
            report.injected_failures = publisher.inner().injected_failures();
        }
    }

    report.snapshots = registry.snapshots();

    if report.exhausted > 0 || report.rejected > 0 {
        warn!(
            "'{}' saw {} exhausted and {} rejected calls",
            report.dependency, report.exhausted, report.rejected
        );
    }

    Ok(report)
}

async fn pace(call: u32, options: &SimulateOptions) {
    if call + 1 < options.calls && !options.interval.is_zero() {
        tokio::time::sleep(options.interval).await;
    }
}

/// Print `report` to stdout
pub fn print_report(report: &SimulationReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    for (name, snapshot) in &report.snapshots {
        println!(
            "{}: state={} failures={} calls={} successes={} rejected={}",
            name,
            snapshot.state,
            snapshot.failure_count,
            snapshot.metrics.total_calls,
            snapshot.metrics.total_successes,
            snapshot.metrics.total_rejected
        );
    }
    Ok(())
}

/// Handle the `simulate` command
pub async fn handle_simulate(config: &TodosConfig, options: SimulateOptions) -> Result<()> {
    let report = run_simulation(config, &options).await?;
    print_report(&report)
}
