//! Standalone binary: parses `GuardianConfig` from the CLI/environment,
//! initializes structured logging and runs the driver's periodic tasks
//! until `SIGINT`/`SIGTERM`.
//!
//! The concrete cluster API, pod API and cloud provider clients are
//! external collaborators this crate does not implement -- wiring them to
//! a real cluster is left to the embedder. This binary wires the in-memory
//! `testkit::FakeCluster` fixture instead, so it runs standalone for
//! manual smoke-testing rather than against a live cluster.

use std::sync::Arc;

use clap::Parser;
use node_guardian_controller::{GuardianConfig, GuardianDriver, SystemClock};
use node_guardian_controller::testkit::FakeCluster;
use tracing_subscriber::EnvFilter;

/// Assumed kubelet status-report period used to validate the configured
/// node monitor grace period. Not itself a `GuardianConfig` field because
/// the kubelet side of that relationship lives outside this controller.
/// Chosen so the default `GuardianConfig` passes validation out of the box
/// (`node_monitor_grace_period_secs` (40) must exceed this times
/// `node_status_update_retry` (5)).
const ASSUMED_KUBELET_REPORT_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = GuardianConfig::parse();
    config
        .validate(ASSUMED_KUBELET_REPORT_PERIOD_SECS)
        .map_err(|err| anyhow::anyhow!(err))?;

    tracing::info!(?config, "starting node guardian controller");

    let cluster = Arc::new(FakeCluster::new());
    let clock = Arc::new(SystemClock);

    let driver = GuardianDriver::new(
        cluster.clone(),
        cluster.clone(),
        cluster.clone(),
        Some(cluster.clone()),
        cluster,
        clock,
        config,
    );

    let handles = driver.spawn();
    let shutdown = driver.shutdown_handle();

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal");
    shutdown.trigger();

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
