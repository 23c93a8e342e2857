//! Central sink - receives and logs drone summaries.
//!
//! Accepts drone connections, parses newline-delimited JSON summaries, and
//! logs each one with its anomalies. The visualization layer of the original
//! system is out of scope; structured logs stand in for it.
//!
//! ## Configuration
//!
//! - `SINK_LISTEN_ADDR`: bind address (default: 127.0.0.1:7001)
//! - `RUST_LOG`: logging level filter (default: info)

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use edge_drone::types::Summary;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7001";

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let listen_addr =
        std::env::var("SINK_LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());

    let listener = match TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %listen_addr, "Failed to bind");
            std::process::exit(1);
        }
    };
    info!(addr = %listen_addr, "Sink listening for drones");

    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                info!(peer = %peer, "Drone connected");
                tokio::spawn(handle_drone(socket));
            }
            Err(e) => {
                warn!(error = %e, "Failed to accept drone connection");
            }
        }
    }
}

async fn handle_drone(socket: TcpStream) {
    let mut lines = BufReader::new(socket).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<Summary>(&line) {
                Ok(summary) => {
                    info!(
                        drone_id = %summary.drone_id,
                        sensors = summary.sensor_ids.join(","),
                        avg_temp = format!("{:.2}", summary.average_temperature),
                        avg_humidity = format!("{:.2}", summary.average_humidity),
                        battery = format!("{:.0}%", summary.battery_level),
                        "Summary received"
                    );
                    for anomaly in &summary.anomalies {
                        warn!(
                            sensor_id = %anomaly.sensor_id,
                            metric = %anomaly.metric,
                            value = anomaly.value,
                            timestamp = %anomaly.timestamp,
                            "Anomaly reported"
                        );
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Malformed summary ignored");
                }
            },
            Ok(None) => {
                info!("Drone disconnected");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Drone link read failed");
                break;
            }
        }
    }
}
