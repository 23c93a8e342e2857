//! Edge Drone Library
//!
//! Components for a simulated environmental monitoring edge aggregator:
//!
//! - **config**: Environment-based configuration for the drone
//! - **types**: Wire and domain types (readings, anomalies, summaries)
//! - **aggregator**: Per-window rolling sums and snapshot close
//! - **classifier**: Bound-based anomaly classification and accumulation
//! - **battery**: Depletion-driven mode state machine
//! - **pipeline**: Shared ingest seam for link handlers and the coordinator
//! - **admitter**: Sensor link admission, framing, and parsing
//! - **forwarder**: Summary delivery with retry, backoff, and queueing
//! - **coordinator**: Window and battery timers, mode propagation, shutdown
//! - **emitter**: Simulated sensor reading generation and streaming
//!
//! # Example
//!
//! ```no_run
//! use edge_drone::battery::Mode;
//! use edge_drone::config::Config;
//! use edge_drone::coordinator::Coordinator;
//! use edge_drone::forwarder::SummaryForwarder;
//! use edge_drone::pipeline::Pipeline;
//! use tokio::sync::{oneshot, watch};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!
//!     let pipeline = Pipeline::new(&config);
//!     let (mode_tx, mode_rx) = watch::channel(Mode::Normal);
//!     let forwarder = SummaryForwarder::new(&config, mode_rx);
//!     let (coordinator, _handle) = Coordinator::new(&config, pipeline, forwarder, mode_tx);
//!
//!     let (_shutdown_tx, shutdown_rx) = oneshot::channel();
//!     coordinator.run(shutdown_rx).await;
//! }
//! ```

// Module declarations
pub mod admitter;
pub mod aggregator;
pub mod battery;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod emitter;
pub mod forwarder;
pub mod pipeline;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use admitter::AdmitterStats;
pub use aggregator::WindowAggregator;
pub use battery::{BatteryManager, Mode};
pub use classifier::AnomalyClassifier;
pub use config::{Bounds, Config, ConfigError, ReturningPolicy};
pub use coordinator::{Coordinator, CoordinatorHandle};
pub use forwarder::{ForwardError, Forwarded, SummaryForwarder, SummarySink, TcpSummarySink};
pub use pipeline::{Pipeline, PipelineStats};
pub use types::{Anomaly, Metric, Reading, Summary, WindowSnapshot};
