//! Anomaly classifier: bound checks per reading plus a per-window accumulator.
//!
//! Classification is a pure function of the configured bounds; the only state
//! is the ordered accumulator drained once per window by the coordinator.

use tracing::warn;

use crate::config::Bounds;
use crate::types::{Anomaly, Metric, Reading};

/// Classifies readings against per-metric bounds and accumulates anomalies
/// for the current window.
#[derive(Debug)]
pub struct AnomalyClassifier {
    temperature_bounds: Bounds,
    humidity_bounds: Bounds,
    accumulated: Vec<Anomaly>,
}

impl AnomalyClassifier {
    pub fn new(temperature_bounds: Bounds, humidity_bounds: Bounds) -> Self {
        Self {
            temperature_bounds,
            humidity_bounds,
            accumulated: Vec::new(),
        }
    }

    /// Classify a reading without touching the accumulator.
    ///
    /// When both metrics are out of bounds the temperature anomaly wins; the
    /// humidity value still shows up in the reading itself.
    pub fn classify(&self, reading: &Reading) -> Option<Anomaly> {
        if !self.temperature_bounds.contains(reading.temperature) {
            return Some(Anomaly {
                sensor_id: reading.sensor_id.clone(),
                value: reading.temperature,
                metric: Metric::Temperature,
                timestamp: reading.timestamp,
            });
        }
        if !self.humidity_bounds.contains(reading.humidity) {
            return Some(Anomaly {
                sensor_id: reading.sensor_id.clone(),
                value: reading.humidity,
                metric: Metric::Humidity,
                timestamp: reading.timestamp,
            });
        }
        None
    }

    /// Classify a reading and record any anomaly in arrival order.
    pub fn observe(&mut self, reading: &Reading) {
        if let Some(anomaly) = self.classify(reading) {
            warn!(
                sensor_id = %anomaly.sensor_id,
                metric = %anomaly.metric,
                value = anomaly.value,
                "Anomaly detected"
            );
            self.accumulated.push(anomaly);
        }
    }

    /// Return all anomalies accumulated since the last drain and clear the
    /// accumulator. Called exactly once per window by the coordinator.
    pub fn drain(&mut self) -> Vec<Anomaly> {
        std::mem::take(&mut self.accumulated)
    }

    /// Number of anomalies pending for the current window.
    pub fn pending(&self) -> usize {
        self.accumulated.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> AnomalyClassifier {
        AnomalyClassifier::new(Bounds::new(-50.0, 60.0), Bounds::new(0.0, 100.0))
    }

    fn reading(temperature: f64, humidity: f64) -> Reading {
        Reading::new("sensor1", temperature, humidity)
    }

    #[test]
    fn test_in_bounds_reading_is_normal() {
        let c = classifier();
        assert!(c.classify(&reading(22.0, 55.0)).is_none());
        assert!(c.classify(&reading(-50.0, 0.0)).is_none());
        assert!(c.classify(&reading(60.0, 100.0)).is_none());
    }

    #[test]
    fn test_extreme_temperature_is_anomalous() {
        let c = classifier();
        let anomaly = c.classify(&reading(1000.0, 50.0)).expect("out of bounds");

        assert_eq!(anomaly.metric, Metric::Temperature);
        assert!((anomaly.value - 1000.0).abs() < f64::EPSILON);
        assert_eq!(anomaly.sensor_id, "sensor1");
    }

    #[test]
    fn test_humidity_out_of_bounds() {
        let c = classifier();
        let anomaly = c.classify(&reading(22.0, 120.0)).expect("out of bounds");

        assert_eq!(anomaly.metric, Metric::Humidity);
        assert!((anomaly.value - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_classification_is_pure() {
        let c = classifier();
        let r = reading(75.0, 50.0);

        // Same reading, same decision, regardless of call order
        for _ in 0..3 {
            let anomaly = c.classify(&r).expect("always anomalous");
            assert_eq!(anomaly.metric, Metric::Temperature);
        }
        for _ in 0..3 {
            assert!(c.classify(&reading(20.0, 50.0)).is_none());
        }
    }

    #[test]
    fn test_drain_returns_arrival_order_and_clears() {
        let mut c = classifier();
        c.observe(&Reading::new("sensor1", 1000.0, 50.0));
        c.observe(&Reading::new("sensor2", 22.0, 55.0));
        c.observe(&Reading::new("sensor3", -80.0, 50.0));

        let drained = c.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].sensor_id, "sensor1");
        assert_eq!(drained[1].sensor_id, "sensor3");

        // Each anomaly appears in exactly one drain
        assert!(c.drain().is_empty());
        assert_eq!(c.pending(), 0);
    }
}
