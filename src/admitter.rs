//! Connection admitter: accepts sensor links and feeds parsed readings into
//! the pipeline.
//!
//! Each link runs as its own task reading newline-delimited JSON. A malformed
//! payload is a soft failure: it is logged and the link stays open. A link
//! idle beyond the configured timeout is torn down the same way as an
//! explicit disconnect. While the drone is RETURNING, new links are refused
//! but existing links keep draining.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::battery::Mode;
use crate::pipeline::Pipeline;
use crate::types::Reading;

/// Counters for link activity, shared across link tasks.
#[derive(Debug, Default)]
pub struct AdmitterStats {
    pub links_accepted: AtomicU64,
    pub links_refused: AtomicU64,
    pub links_lost: AtomicU64,
    pub readings_accepted: AtomicU64,
    pub parse_errors: AtomicU64,
}

/// One accepted sensor connection.
///
/// Acquired on accept, released when the handler returns on disconnect, idle
/// timeout, or read error.
struct SensorLink {
    link_id: Uuid,
    peer: std::net::SocketAddr,

    /// Learned from the first successfully parsed message
    sensor_id: Option<String>,
}

impl SensorLink {
    fn label(&self) -> String {
        match &self.sensor_id {
            Some(id) => id.clone(),
            None => format!("link-{}", self.link_id),
        }
    }
}

/// Accept sensor links until the listener task is dropped.
///
/// Admission is gated on the battery mode: NORMAL and LOW admit
/// unconditionally, RETURNING refuses with a log record and closes the
/// socket.
pub async fn run_admitter(
    listener: TcpListener,
    pipeline: Pipeline,
    mode_rx: watch::Receiver<Mode>,
    idle_timeout: Duration,
    stats: Arc<AdmitterStats>,
) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Failed to accept sensor connection");
                continue;
            }
        };

        if *mode_rx.borrow() == Mode::Returning {
            warn!(peer = %peer, "Connection refused: drone returning to base");
            stats.links_refused.fetch_add(1, Ordering::Relaxed);
            drop(socket);
            continue;
        }

        let link = SensorLink {
            link_id: Uuid::new_v4(),
            peer,
            sensor_id: None,
        };
        info!(peer = %peer, link_id = %link.link_id, "Sensor connected");
        stats.links_accepted.fetch_add(1, Ordering::Relaxed);

        let pipeline = pipeline.clone();
        let stats = stats.clone();
        tokio::spawn(async move {
            handle_link(socket, link, pipeline, idle_timeout, stats).await;
        });
    }
}

/// Drive one sensor link to completion.
async fn handle_link(
    socket: TcpStream,
    mut link: SensorLink,
    pipeline: Pipeline,
    idle_timeout: Duration,
    stats: Arc<AdmitterStats>,
) {
    let mut lines = BufReader::new(socket).lines();

    loop {
        let next = match timeout(idle_timeout, lines.next_line()).await {
            Err(_) => {
                warn!(
                    link = %link.label(),
                    peer = %link.peer,
                    idle_secs = idle_timeout.as_secs(),
                    "Link idle timeout, treating as disconnected"
                );
                break;
            }
            Ok(result) => result,
        };

        match next {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Reading>(&line) {
                    Ok(reading) => {
                        if link.sensor_id.is_none() {
                            link.sensor_id = Some(reading.sensor_id.clone());
                        }
                        debug!(
                            sensor_id = %reading.sensor_id,
                            temperature = reading.temperature,
                            humidity = reading.humidity,
                            "Reading accepted"
                        );
                        stats.readings_accepted.fetch_add(1, Ordering::Relaxed);
                        // Synchronous hand-off: aggregated and classified
                        // before the next read
                        pipeline.ingest(&reading);
                    }
                    Err(e) => {
                        // Soft failure: one bad message does not drop a sensor
                        warn!(
                            link = %link.label(),
                            peer = %link.peer,
                            error = %e,
                            "Malformed reading rejected"
                        );
                        stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Ok(None) => {
                info!(link = %link.label(), peer = %link.peer, "Sensor disconnected");
                break;
            }
            Err(e) => {
                warn!(link = %link.label(), peer = %link.peer, error = %e, "Link read failed");
                break;
            }
        }
    }

    stats.links_lost.fetch_add(1, Ordering::Relaxed);
}
