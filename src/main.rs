//! ICMP reachability monitor.
//!
//! Wires together the target registry, embedded store, one prober task
//! per target, the stats engine, and the two ancillary collectors, then
//! waits for a shutdown signal and unwinds every task via a shared
//! broadcast channel before exiting.

mod ancillary;
mod config;
mod db;
mod prober;
mod registry;
mod resolver;
mod snapshot;
mod stats;
mod view;

use std::process::ExitCode;
use std::sync::Arc;

use config::MonitorConfig;
use db::Store;
use snapshot::SharedSnapshot;
use tokio::sync::broadcast;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("icmp_monitor=info".parse().unwrap()),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("startup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = MonitorConfig::load();
    tracing::info!("loading target registry from {}", cfg.registry_path.display());
    let targets = registry::load_or_init(&cfg.registry_path)?;

    tracing::info!("opening store at {}", cfg.store_path.display());
    let store = Arc::new(Store::new(&cfg.store_path)?);

    for target in &targets {
        store.upsert_target(target)?;
    }

    let snapshot = Arc::new(SharedSnapshot::new());
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut handles = Vec::new();

    for target in targets {
        let store = store.clone();
        let snapshot = snapshot.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let probe_interval = cfg.probe_interval;
        let probe_timeout = cfg.probe_timeout;
        handles.push(tokio::spawn(async move {
            prober::run(target, store, snapshot, probe_interval, probe_timeout, shutdown_rx).await;
        }));
    }

    {
        let store = store.clone();
        let snapshot = snapshot.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let stats_interval = cfg.stats_interval;
        let retention = cfg.retention;
        handles.push(tokio::spawn(async move {
            stats::run(store, snapshot, stats_interval, retention, shutdown_rx).await;
        }));
    }

    {
        let snapshot = snapshot.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let interval = cfg.public_ip_interval;
        handles.push(tokio::spawn(async move {
            ancillary::public_ip::run(snapshot, interval, shutdown_rx).await;
        }));
    }

    {
        let snapshot = snapshot.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let interval = cfg.interface_interval;
        handles.push(tokio::spawn(async move {
            ancillary::interfaces::run(snapshot, interval, shutdown_rx).await;
        }));
    }

    tracing::info!("icmp-monitor running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, stopping tasks");

    let _ = shutdown_tx.send(());
    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("all tasks stopped, exiting");
    Ok(())
}
