//! Shared ingest seam between link handlers and the coordinator.
//!
//! The aggregator and classifier sit behind one lock so that a reading and
//! the anomaly it may produce always land in the same window, and so that a
//! window close is atomic with respect to concurrent ingest. Readings
//! observed before a close belong to that window; readings arriving during a
//! close wait on the lock and land in the next one.

use std::sync::{Arc, Mutex};

use crate::aggregator::WindowAggregator;
use crate::classifier::AnomalyClassifier;
use crate::config::Config;
use crate::types::{Anomaly, Reading, WindowSnapshot};

/// Counters for pipeline activity, readable without the pipeline lock.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total readings ingested across all windows
    pub readings_ingested: u64,

    /// Total anomalies recorded across all windows
    pub anomalies_recorded: u64,

    /// Total windows closed
    pub windows_closed: u64,
}

struct Inner {
    aggregator: WindowAggregator,
    classifier: AnomalyClassifier,
    stats: PipelineStats,
}

/// Cloneable handle to the shared aggregation pipeline.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Mutex<Inner>>,
}

impl Pipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                aggregator: WindowAggregator::new(),
                classifier: AnomalyClassifier::new(
                    config.temperature_bounds,
                    config.humidity_bounds,
                ),
                stats: PipelineStats::default(),
            })),
        }
    }

    /// Hand a validated reading to the aggregator and classifier.
    ///
    /// Synchronous: the reading is fully accounted for before this returns.
    pub fn ingest(&self, reading: &Reading) {
        let mut inner = self.inner.lock().expect("pipeline lock poisoned");
        inner.aggregator.add(reading);
        let pending_before = inner.classifier.pending();
        inner.classifier.observe(reading);

        inner.stats.readings_ingested += 1;
        if inner.classifier.pending() > pending_before {
            inner.stats.anomalies_recorded += 1;
        }
    }

    /// Close the current window and drain its anomalies in one atomic step.
    pub fn close_window(&self) -> (WindowSnapshot, Vec<Anomaly>) {
        let mut inner = self.inner.lock().expect("pipeline lock poisoned");
        let snapshot = inner.aggregator.close_window();
        let anomalies = inner.classifier.drain();
        inner.stats.windows_closed += 1;
        (snapshot, anomalies)
    }

    /// Number of readings in the currently open window.
    pub fn open_window_len(&self) -> usize {
        self.inner.lock().expect("pipeline lock poisoned").aggregator.len()
    }

    pub fn stats(&self) -> PipelineStats {
        self.inner
            .lock()
            .expect("pipeline lock poisoned")
            .stats
            .clone()
    }
}
