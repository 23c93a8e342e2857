//! Sensor node - simulated environmental sensor.
//!
//! Streams randomized readings to a drone as newline-delimited JSON,
//! reconnecting whenever the link drops.
//!
//! ## Configuration
//!
//! - `SENSOR_ID`: sensor identifier (default: sensor1)
//! - `SENSOR_DRONE_ADDR`: drone address (default: 127.0.0.1:6001)
//! - `SENSOR_INTERVAL_MS`: milliseconds between readings (default: 1000)
//! - `RUST_LOG`: logging level filter (default: info)

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use edge_drone::emitter::{run_emitter, EmitterConfig};

const DEFAULT_DRONE_ADDR: &str = "127.0.0.1:6001";

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let sensor_id = std::env::var("SENSOR_ID").unwrap_or_else(|_| "sensor1".to_string());

    let drone_addr: SocketAddr = match std::env::var("SENSOR_DRONE_ADDR")
        .unwrap_or_else(|_| DEFAULT_DRONE_ADDR.to_string())
        .parse()
    {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "SENSOR_DRONE_ADDR is not a valid address");
            std::process::exit(1);
        }
    };

    let interval_ms: u64 = std::env::var("SENSOR_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000);

    let config = EmitterConfig {
        sensor_id: sensor_id.clone(),
        interval: Duration::from_millis(interval_ms),
        ..EmitterConfig::default()
    };

    info!(sensor_id = %sensor_id, drone = %drone_addr, interval_ms, "Sensor starting");
    run_emitter(drone_addr, config).await;
}
