//! Edge coordinator: owns the window and battery timers and sequences the
//! per-window pipeline.
//!
//! On each window tick: close the window, drain anomalies, compose the
//! summary, forward it. On each battery tick: advance the battery manager and
//! broadcast any mode change before anything else can observe it. A recovery
//! command recharges the battery and flushes the forwarder's backlog.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::battery::{BatteryManager, Mode};
use crate::config::Config;
use crate::forwarder::{Forwarded, SummaryForwarder, SummarySink};
use crate::pipeline::Pipeline;
use crate::types::Summary;

/// Commands accepted by a running coordinator.
#[derive(Debug)]
enum Command {
    Recover,
}

/// Handle for signalling a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    /// Trigger a battery recovery event (recharge at base).
    pub async fn recover(&self) {
        if self.cmd_tx.send(Command::Recover).await.is_err() {
            warn!("Recovery signal dropped: coordinator is gone");
        }
    }
}

/// Sequences window closes, battery ticks, and mode propagation.
pub struct Coordinator<S: SummarySink> {
    drone_id: String,
    pipeline: Pipeline,
    battery: BatteryManager,
    forwarder: SummaryForwarder<S>,
    mode_tx: watch::Sender<Mode>,
    window_period: std::time::Duration,
    battery_tick: std::time::Duration,
    cmd_rx: mpsc::Receiver<Command>,

    /// Keeps the command channel open even if every handle is dropped
    _cmd_tx: mpsc::Sender<Command>,
}

impl<S: SummarySink> Coordinator<S> {
    /// Wire up a coordinator.
    ///
    /// `mode_tx` is the battery-mode broadcast channel; the admitter and
    /// forwarder hold receivers on it.
    pub fn new(
        config: &Config,
        pipeline: Pipeline,
        forwarder: SummaryForwarder<S>,
        mode_tx: watch::Sender<Mode>,
    ) -> (Self, CoordinatorHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let handle = CoordinatorHandle {
            cmd_tx: cmd_tx.clone(),
        };

        let coordinator = Self {
            drone_id: config.drone_id.clone(),
            pipeline,
            battery: BatteryManager::new(
                config.depletion_rate,
                config.low_threshold,
                config.critical_threshold,
            ),
            forwarder,
            mode_tx,
            window_period: config.window_period,
            battery_tick: config.battery_tick,
            cmd_rx,
            _cmd_tx: cmd_tx,
        };

        (coordinator, handle)
    }

    /// Run until the shutdown signal fires, then drain the final window.
    pub async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut window_ticker = interval(self.window_period);
        let mut battery_ticker = interval(self.battery_tick);
        // Skip the first immediate tick of each timer
        window_ticker.tick().await;
        battery_ticker.tick().await;

        info!(
            window_secs = self.window_period.as_secs(),
            battery_tick_secs = self.battery_tick.as_secs(),
            "Coordinator running"
        );

        loop {
            tokio::select! {
                _ = window_ticker.tick() => {
                    self.close_and_forward().await;
                }

                _ = battery_ticker.tick() => {
                    self.advance_battery();
                }

                Some(cmd) = self.cmd_rx.recv() => {
                    match cmd {
                        Command::Recover => self.recover().await,
                    }
                }

                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received, draining final window");
                    break;
                }
            }
        }

        // No window is left partially aggregated: the in-flight window goes
        // out through the normal retry budget before we return.
        self.close_and_forward().await;
        info!("Coordinator stopped");
    }

    /// Close the current window and forward its summary.
    ///
    /// Atomic with respect to new readings: anything arriving during the
    /// close lands in the next window.
    async fn close_and_forward(&mut self) {
        let (snapshot, anomalies) = self.pipeline.close_window();
        let summary = Summary::compose(
            self.drone_id.clone(),
            snapshot,
            anomalies,
            self.battery.level(),
        );

        let sample_count = summary.sensor_ids.len();
        match self.forwarder.forward(summary).await {
            Ok(Forwarded::Sent) => {
                info!(sensors = sample_count, "Window summary forwarded");
            }
            Ok(Forwarded::Queued) => {
                info!(queued = self.forwarder.queued(), "Window summary queued");
            }
            Ok(Forwarded::Discarded) => {}
            Err(e) => {
                // At-most-once: the summary is gone, only the log remains
                error!(error = %e, "Window summary lost");
            }
        }
    }

    /// Advance the battery one tick and broadcast a mode change, if any,
    /// before returning.
    fn advance_battery(&mut self) {
        if let Some(mode) = self.battery.tick() {
            self.mode_tx.send_replace(mode);
        }
    }

    /// Handle a recovery event: full recharge, NORMAL mode, backlog flush.
    async fn recover(&mut self) {
        if let Some(mode) = self.battery.recover() {
            self.mode_tx.send_replace(mode);
            self.forwarder.flush_queued().await;
        }
    }

    /// Current battery mode, for observability.
    pub fn mode(&self) -> Mode {
        self.battery.mode()
    }
}
