//! Edge Drone - environmental monitoring edge aggregator
//!
//! Accepts sensor links over TCP, aggregates readings per window, classifies
//! anomalies, simulates battery depletion, and forwards one summary per
//! window to the central sink.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (see
//! [`edge_drone::config::Config`] for the full list):
//!
//! - `DRONE_LISTEN_ADDR`: bind address for sensor links (default: 0.0.0.0:6001)
//! - `DRONE_SINK_ADDR`: central sink address (default: 127.0.0.1:7001)
//! - `DRONE_WINDOW_PERIOD_SECS`: window period (default: 5)
//! - `RUST_LOG`: logging level filter (default: info)

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use edge_drone::admitter::{run_admitter, AdmitterStats};
use edge_drone::battery::Mode;
use edge_drone::config::Config;
use edge_drone::coordinator::Coordinator;
use edge_drone::forwarder::SummaryForwarder;
use edge_drone::pipeline::Pipeline;

#[tokio::main]
async fn main() {
    init_tracing();

    info!("Starting edge drone...");

    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                drone_id = %config.drone_id,
                listen_addr = %config.listen_addr,
                sink_addr = %config.sink_addr,
                window_secs = config.window_period.as_secs(),
                returning_policy = %config.returning_policy,
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %config.listen_addr, "Failed to bind sensor listener");
            std::process::exit(1);
        }
    };
    info!(addr = %config.listen_addr, "Listening for sensors");

    let pipeline = Pipeline::new(&config);
    let (mode_tx, mode_rx) = watch::channel(Mode::Normal);
    let forwarder = SummaryForwarder::new(&config, mode_rx.clone());
    let (coordinator, _handle) = Coordinator::new(&config, pipeline.clone(), forwarder, mode_tx);

    let admitter_stats = Arc::new(AdmitterStats::default());
    let admitter_handle = tokio::spawn(run_admitter(
        listener,
        pipeline.clone(),
        mode_rx,
        config.idle_timeout,
        admitter_stats.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let coordinator_handle = tokio::spawn(coordinator.run(shutdown_rx));

    info!("Edge drone running. Press Ctrl+C to stop.");
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping...");
        }
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    }

    // Graceful shutdown: stop admitting, then let the coordinator drain the
    // final window through its retry budget
    admitter_handle.abort();
    let _ = shutdown_tx.send(());

    let shutdown_timeout = Duration::from_secs(10);
    match tokio::time::timeout(shutdown_timeout, coordinator_handle).await {
        Ok(Ok(())) => {
            info!("Coordinator shut down gracefully");
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Coordinator panicked during shutdown");
        }
        Err(_) => {
            warn!("Coordinator shutdown timed out after {:?}", shutdown_timeout);
        }
    }

    let stats = pipeline.stats();
    info!(
        readings = stats.readings_ingested,
        anomalies = stats.anomalies_recorded,
        windows = stats.windows_closed,
        "Edge drone stopped"
    );
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}
