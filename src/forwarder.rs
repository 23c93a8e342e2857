//! Summary forwarder: delivers composed summaries to the central sink.
//!
//! Delivery uses a persistent TCP connection carrying newline-delimited JSON,
//! with bounded exponential backoff on failure. Forwarding is at-most-once: a
//! summary that exhausts its retry budget is logged and dropped, never
//! requeued. While the drone is RETURNING, summaries are queued or discarded
//! per the configured policy; a queued backlog is flushed in window order on
//! recovery.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::battery::Mode;
use crate::config::{Config, ReturningPolicy};
use crate::types::Summary;

/// Maximum delay between retries (in milliseconds).
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Errors that can occur while forwarding a summary.
#[derive(Debug)]
pub enum ForwardError {
    /// Transport failure on a single attempt
    Io(io::Error),

    /// All retry attempts exhausted; the summary has been dropped
    RetriesExhausted { attempts: u32, last_error: String },

    /// Failed to serialize the summary
    Serialize(String),
}

impl std::fmt::Display for ForwardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardError::Io(e) => write!(f, "Delivery failed: {}", e),
            ForwardError::RetriesExhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "All {} delivery attempts exhausted. Last error: {}",
                attempts, last_error
            ),
            ForwardError::Serialize(e) => write!(f, "Failed to serialize summary: {}", e),
        }
    }
}

impl std::error::Error for ForwardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ForwardError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// What became of a forwarded summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    /// Delivered to the sink
    Sent,

    /// Held in the RETURNING-mode queue
    Queued,

    /// Dropped by the RETURNING-mode discard policy
    Discarded,
}

/// Statistics about forwarder operations.
#[derive(Debug, Clone, Default)]
pub struct ForwarderStats {
    pub summaries_sent: u64,
    pub summaries_queued: u64,
    pub summaries_discarded: u64,
    pub summaries_failed: u64,
    pub retries: u64,
}

/// Downstream delivery transport, one newline-delimited JSON record per call.
///
/// Abstracted so tests can run against an in-memory sink.
pub trait SummarySink {
    fn deliver(&mut self, line: &str) -> impl std::future::Future<Output = io::Result<()>> + Send;
}

/// Persistent TCP connection to the central sink.
///
/// Connects lazily and drops the connection on any write failure so the next
/// attempt reconnects.
pub struct TcpSummarySink {
    addr: SocketAddr,
    stream: Option<TcpStream>,
}

impl TcpSummarySink {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, stream: None }
    }
}

impl SummarySink for TcpSummarySink {
    async fn deliver(&mut self, line: &str) -> io::Result<()> {
        if self.stream.is_none() {
            let stream = TcpStream::connect(self.addr).await?;
            info!(sink = %self.addr, "Connected to sink");
            self.stream = Some(stream);
        }

        let stream = self.stream.as_mut().expect("stream just ensured");
        let result = async {
            stream.write_all(line.as_bytes()).await?;
            stream.write_all(b"\n").await?;
            stream.flush().await
        }
        .await;

        if result.is_err() {
            self.stream = None;
        }
        result
    }
}

/// Forwards summaries downstream, gated by the battery mode.
pub struct SummaryForwarder<S: SummarySink> {
    sink: S,
    mode_rx: watch::Receiver<Mode>,
    policy: ReturningPolicy,
    queue_capacity: usize,
    queue: VecDeque<Summary>,
    max_retries: u32,
    backoff_base: Duration,
    stats: ForwarderStats,
}

impl SummaryForwarder<TcpSummarySink> {
    /// Create a forwarder with a persistent TCP sink from configuration.
    pub fn new(config: &Config, mode_rx: watch::Receiver<Mode>) -> Self {
        Self::with_sink(TcpSummarySink::new(config.sink_addr), config, mode_rx)
    }
}

impl<S: SummarySink> SummaryForwarder<S> {
    /// Create a forwarder over an arbitrary sink.
    pub fn with_sink(sink: S, config: &Config, mode_rx: watch::Receiver<Mode>) -> Self {
        Self {
            sink,
            mode_rx,
            policy: config.returning_policy,
            queue_capacity: config.queue_capacity,
            queue: VecDeque::new(),
            max_retries: config.max_retries,
            backoff_base: config.backoff_base,
            stats: ForwarderStats::default(),
        }
    }

    /// Forward one summary, subject to the current mode.
    ///
    /// In NORMAL and LOW mode the summary is delivered with retries; in
    /// RETURNING mode it is queued or discarded per policy.
    pub async fn forward(&mut self, summary: Summary) -> Result<Forwarded, ForwardError> {
        if *self.mode_rx.borrow() == Mode::Returning {
            return Ok(self.hold(summary));
        }
        self.send_with_retries(summary).await.map(|_| Forwarded::Sent)
    }

    /// Flush the RETURNING-mode queue in original window order.
    ///
    /// Called on recovery. Each queued summary keeps at-most-once semantics:
    /// one that exhausts its retry budget is dropped with a log record and the
    /// flush continues with the rest.
    pub async fn flush_queued(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        info!(queued = self.queue.len(), "Flushing queued summaries after recovery");

        while let Some(summary) = self.queue.pop_front() {
            let timestamp = summary.timestamp;
            if let Err(e) = self.send_with_retries(summary).await {
                error!(
                    error = %e,
                    window_end = %timestamp,
                    "Undelivered queued summary dropped"
                );
            }
        }
    }

    /// Number of summaries currently held in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> &ForwarderStats {
        &self.stats
    }

    fn hold(&mut self, summary: Summary) -> Forwarded {
        match self.policy {
            ReturningPolicy::Queue => {
                if self.queue.len() >= self.queue_capacity {
                    let dropped = self.queue.pop_front().expect("queue is non-empty");
                    warn!(
                        window_end = %dropped.timestamp,
                        capacity = self.queue_capacity,
                        "Summary queue full, dropping oldest"
                    );
                    self.stats.summaries_discarded += 1;
                }
                debug!(queued = self.queue.len() + 1, "Summary queued while returning");
                self.queue.push_back(summary);
                self.stats.summaries_queued += 1;
                Forwarded::Queued
            }
            ReturningPolicy::Discard => {
                warn!(
                    window_end = %summary.timestamp,
                    "Summary discarded while returning"
                );
                self.stats.summaries_discarded += 1;
                Forwarded::Discarded
            }
        }
    }

    /// Deliver a summary with bounded exponential backoff.
    async fn send_with_retries(&mut self, summary: Summary) -> Result<(), ForwardError> {
        let line =
            serde_json::to_string(&summary).map_err(|e| ForwardError::Serialize(e.to_string()))?;

        let mut last_error: Option<io::Error> = None;
        let mut attempt = 0;

        while attempt <= self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt);
                warn!(
                    attempt = attempt,
                    max_retries = self.max_retries,
                    delay_ms = delay.as_millis(),
                    "Retrying summary delivery"
                );
                self.stats.retries += 1;
                tokio::time::sleep(delay).await;
            }

            match self.sink.deliver(&line).await {
                Ok(()) => {
                    debug!(
                        samples = summary.sensor_ids.len(),
                        anomalies = summary.anomaly_count(),
                        "Summary delivered"
                    );
                    self.stats.summaries_sent += 1;
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempt + 1, "Summary delivery failed");
                    last_error = Some(e);
                    attempt += 1;
                }
            }
        }

        self.stats.summaries_failed += 1;
        let last_error_msg = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        Err(ForwardError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error: last_error_msg,
        })
    }

    /// Calculate the backoff delay for a given retry attempt.
    ///
    /// delay = min(base * 2^attempt + jitter, max_delay), jitter up to 25%.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.backoff_base.as_millis() as u64;

        let exponential = base.saturating_mul(1 << attempt.min(10));
        let jitter = rand::random::<u64>() % (exponential / 4 + 1);
        let total = exponential.saturating_add(jitter).min(MAX_RETRY_DELAY_MS);

        Duration::from_millis(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    /// In-memory sink that fails a configurable number of times first.
    struct MemorySink {
        lines: Vec<String>,
        failures_remaining: usize,
    }

    impl MemorySink {
        fn new(failures: usize) -> Self {
            Self {
                lines: Vec::new(),
                failures_remaining: failures,
            }
        }
    }

    impl SummarySink for MemorySink {
        async fn deliver(&mut self, line: &str) -> io::Result<()> {
            if self.failures_remaining > 0 {
                self.failures_remaining -= 1;
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            self.lines.push(line.to_string());
            Ok(())
        }
    }

    fn summary(marker: f64) -> Summary {
        Summary {
            drone_id: "drone1".to_string(),
            sensor_ids: vec!["sensor1".to_string()],
            average_temperature: marker,
            average_humidity: 50.0,
            anomalies: Vec::new(),
            battery_level: 80.0,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, marker as u32).unwrap(),
        }
    }

    fn fast_config() -> Config {
        Config {
            backoff_base: Duration::from_millis(1),
            queue_capacity: 3,
            ..Config::default()
        }
    }

    fn forwarder(sink: MemorySink, mode: Mode) -> SummaryForwarder<MemorySink> {
        let (_tx, rx) = watch::channel(mode);
        SummaryForwarder::with_sink(sink, &fast_config(), rx)
    }

    #[tokio::test]
    async fn test_forward_delivers_in_normal_mode() {
        let mut fwd = forwarder(MemorySink::new(0), Mode::Normal);

        let result = fwd.forward(summary(22.0)).await.unwrap();

        assert_eq!(result, Forwarded::Sent);
        assert_eq!(fwd.sink.lines.len(), 1);
        assert!(fwd.sink.lines[0].contains(r#""average_temperature":22.0"#));
        assert_eq!(fwd.stats().summaries_sent, 1);
    }

    #[tokio::test]
    async fn test_forward_delivers_in_low_mode() {
        let mut fwd = forwarder(MemorySink::new(0), Mode::Low);
        assert_eq!(fwd.forward(summary(1.0)).await.unwrap(), Forwarded::Sent);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let mut fwd = forwarder(MemorySink::new(2), Mode::Normal);

        let result = fwd.forward(summary(1.0)).await.unwrap();

        assert_eq!(result, Forwarded::Sent);
        assert_eq!(fwd.sink.lines.len(), 1);
        assert_eq!(fwd.stats().retries, 2);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_drops_summary() {
        // Default budget is 3 retries, so 4 failures exhaust it
        let mut fwd = forwarder(MemorySink::new(10), Mode::Normal);

        let err = fwd.forward(summary(1.0)).await.unwrap_err();

        match err {
            ForwardError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(fwd.stats().summaries_failed, 1);
        assert!(fwd.sink.lines.is_empty());
    }

    #[tokio::test]
    async fn test_returning_queue_caps_and_drops_oldest() {
        let mut fwd = forwarder(MemorySink::new(0), Mode::Returning);

        for marker in 0..5 {
            let result = fwd.forward(summary(marker as f64)).await.unwrap();
            assert_eq!(result, Forwarded::Queued);
        }

        // Capacity 3: markers 0 and 1 dropped, 2..5 retained
        assert_eq!(fwd.queued(), 3);
        assert_eq!(fwd.stats().summaries_discarded, 2);
        assert!(fwd.sink.lines.is_empty());
    }

    #[tokio::test]
    async fn test_flush_after_recovery_preserves_window_order() {
        let (mode_tx, mode_rx) = watch::channel(Mode::Returning);
        let mut fwd = SummaryForwarder::with_sink(MemorySink::new(0), &fast_config(), mode_rx);

        for marker in 0..5 {
            fwd.forward(summary(marker as f64)).await.unwrap();
        }

        mode_tx.send(Mode::Normal).unwrap();
        fwd.flush_queued().await;

        assert_eq!(fwd.queued(), 0);
        let markers: Vec<&str> = fwd
            .sink
            .lines
            .iter()
            .map(|l| {
                if l.contains(r#""average_temperature":2.0"#) {
                    "2"
                } else if l.contains(r#""average_temperature":3.0"#) {
                    "3"
                } else {
                    "4"
                }
            })
            .collect();
        assert_eq!(markers, vec!["2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_discard_policy_drops_new_summaries() {
        let (_tx, rx) = watch::channel(Mode::Returning);
        let config = Config {
            returning_policy: ReturningPolicy::Discard,
            ..fast_config()
        };
        let mut fwd = SummaryForwarder::with_sink(MemorySink::new(0), &config, rx);

        let result = fwd.forward(summary(1.0)).await.unwrap();

        assert_eq!(result, Forwarded::Discarded);
        assert_eq!(fwd.queued(), 0);
        assert_eq!(fwd.stats().summaries_discarded, 1);
    }

    #[tokio::test]
    async fn test_backoff_delay_increases_and_caps() {
        let fwd = forwarder(MemorySink::new(0), Mode::Normal);

        let d1 = fwd.backoff_delay(1);
        let d2 = fwd.backoff_delay(2);
        // base 1ms: 2ms and 4ms plus up to 25% jitter
        assert!(d1.as_millis() >= 2);
        assert!(d2.as_millis() >= 4);

        let capped = fwd.backoff_delay(30);
        assert!(capped.as_millis() <= MAX_RETRY_DELAY_MS as u128);
    }
}
