//! Wire and domain types shared across the drone pipeline.
//!
//! The sensor and sink legs both carry newline-delimited JSON. A [`Reading`]
//! is one inbound sensor message; a [`Summary`] is one outbound message per
//! closed window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which metric an anomaly was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Temperature,
    Humidity,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Temperature => write!(f, "temperature"),
            Metric::Humidity => write!(f, "humidity"),
        }
    }
}

/// A single parsed sensor reading.
///
/// Immutable once parsed; consumed by the aggregator and classifier and not
/// kept beyond the current window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    /// Identifier of the reporting sensor
    pub sensor_id: String,

    /// Temperature in degrees Celsius
    pub temperature: f64,

    /// Relative humidity in percent
    pub humidity: f64,

    /// Timestamp assigned by the sensor at generation time
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(sensor_id: impl Into<String>, temperature: f64, humidity: f64) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            temperature,
            humidity,
            timestamp: Utc::now(),
        }
    }
}

/// An out-of-bounds reading recorded by the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub sensor_id: String,
    pub value: f64,
    pub metric: Metric,
    pub timestamp: DateTime<Utc>,
}

/// The closed, immutable aggregation result for one window.
///
/// Created exactly once per window by [`crate::aggregator::WindowAggregator`],
/// consumed once by the coordinator, discarded after forwarding.
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    pub average_temperature: f64,
    pub average_humidity: f64,
    pub sample_count: usize,

    /// Sensors heard from during this window, sorted for stable output
    pub sensor_ids: Vec<String>,

    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// The consolidated per-window message sent to the central sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Identifier of this drone
    pub drone_id: String,

    /// Sensors that contributed to this window
    pub sensor_ids: Vec<String>,

    pub average_temperature: f64,
    pub average_humidity: f64,

    /// Anomalies observed within this window, in arrival order
    pub anomalies: Vec<Anomaly>,

    /// Battery level at compose time, percent
    pub battery_level: f64,

    pub timestamp: DateTime<Utc>,
}

impl Summary {
    /// Compose a summary from a closed window and its drained anomalies.
    pub fn compose(
        drone_id: impl Into<String>,
        snapshot: WindowSnapshot,
        anomalies: Vec<Anomaly>,
        battery_level: f64,
    ) -> Self {
        Self {
            drone_id: drone_id.into(),
            sensor_ids: snapshot.sensor_ids,
            average_temperature: snapshot.average_temperature,
            average_humidity: snapshot.average_humidity,
            anomalies,
            battery_level,
            timestamp: snapshot.window_end,
        }
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_serialization() {
        assert_eq!(
            serde_json::to_string(&Metric::Temperature).unwrap(),
            r#""temperature""#
        );
        assert_eq!(
            serde_json::to_string(&Metric::Humidity).unwrap(),
            r#""humidity""#
        );
    }

    #[test]
    fn test_reading_wire_format_roundtrip() {
        let json = r#"{"sensor_id":"sensor1","temperature":23.5,"humidity":55.0,"timestamp":"2026-01-01T12:00:00Z"}"#;
        let reading: Reading = serde_json::from_str(json).unwrap();

        assert_eq!(reading.sensor_id, "sensor1");
        assert!((reading.temperature - 23.5).abs() < f64::EPSILON);
        assert!((reading.humidity - 55.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reading_rejects_missing_fields() {
        let json = r#"{"sensor_id":"sensor1","temperature":23.5}"#;
        assert!(serde_json::from_str::<Reading>(json).is_err());
    }

    #[test]
    fn test_summary_compose() {
        let snapshot = WindowSnapshot {
            average_temperature: 22.0,
            average_humidity: 50.0,
            sample_count: 4,
            sensor_ids: vec!["sensor1".to_string(), "sensor2".to_string()],
            window_start: Utc::now(),
            window_end: Utc::now(),
        };
        let anomaly = Anomaly {
            sensor_id: "sensor1".to_string(),
            value: 1000.0,
            metric: Metric::Temperature,
            timestamp: Utc::now(),
        };

        let summary = Summary::compose("drone1", snapshot, vec![anomaly], 87.0);

        assert_eq!(summary.drone_id, "drone1");
        assert_eq!(summary.sensor_ids.len(), 2);
        assert_eq!(summary.anomaly_count(), 1);
        assert!((summary.battery_level - 87.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_serialization_contains_wire_fields() {
        let summary = Summary {
            drone_id: "drone1".to_string(),
            sensor_ids: vec!["sensor1".to_string()],
            average_temperature: 22.0,
            average_humidity: 50.0,
            anomalies: Vec::new(),
            battery_level: 100.0,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&summary).unwrap();

        assert!(json.contains(r#""average_temperature":22.0"#));
        assert!(json.contains(r#""average_humidity":50.0"#));
        assert!(json.contains(r#""anomalies":[]"#));
        assert!(json.contains(r#""timestamp""#));
    }
}
