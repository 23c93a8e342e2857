//! Window aggregator: rolling per-window sums and counts.
//!
//! The aggregator holds running state since the last window close. `add` is
//! O(1); `close_window` captures the running state into a snapshot, resets it,
//! and carries the previous averages forward for the zero-reading case.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::{Reading, WindowSnapshot};

/// Accumulates readings for the current window and closes them into snapshots.
///
/// Not internally synchronized; shared access goes through the pipeline lock,
/// which also guarantees that every reading lands in exactly one window.
#[derive(Debug)]
pub struct WindowAggregator {
    temperature_sum: f64,
    humidity_sum: f64,
    count: usize,

    /// Sensors heard from since the last close. BTreeSet keeps the summary
    /// ordering stable across runs.
    sensor_ids: BTreeSet<String>,

    /// Close time of the previous window, start of the current one
    window_start: DateTime<Utc>,

    /// Averages of the previous window, reported when a window closes empty
    previous_averages: Option<(f64, f64)>,
}

impl WindowAggregator {
    pub fn new() -> Self {
        Self {
            temperature_sum: 0.0,
            humidity_sum: 0.0,
            count: 0,
            sensor_ids: BTreeSet::new(),
            window_start: Utc::now(),
            previous_averages: None,
        }
    }

    /// Add a reading to the current window.
    pub fn add(&mut self, reading: &Reading) {
        self.temperature_sum += reading.temperature;
        self.humidity_sum += reading.humidity;
        self.count += 1;
        if !self.sensor_ids.contains(&reading.sensor_id) {
            self.sensor_ids.insert(reading.sensor_id.clone());
        }
    }

    /// Number of readings in the current window.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Close the current window into a snapshot and reset running state.
    ///
    /// An empty window reports the previous window's averages, or 0.0 for both
    /// metrics if no prior window exists.
    pub fn close_window(&mut self) -> WindowSnapshot {
        let window_end = Utc::now();

        let (average_temperature, average_humidity) = if self.count > 0 {
            (
                self.temperature_sum / self.count as f64,
                self.humidity_sum / self.count as f64,
            )
        } else {
            self.previous_averages.unwrap_or((0.0, 0.0))
        };

        let snapshot = WindowSnapshot {
            average_temperature,
            average_humidity,
            sample_count: self.count,
            sensor_ids: self.sensor_ids.iter().cloned().collect(),
            window_start: self.window_start,
            window_end,
        };

        debug!(
            sample_count = snapshot.sample_count,
            sensors = snapshot.sensor_ids.len(),
            "Window closed"
        );

        self.temperature_sum = 0.0;
        self.humidity_sum = 0.0;
        self.count = 0;
        self.sensor_ids.clear();
        self.window_start = window_end;
        self.previous_averages = Some((average_temperature, average_humidity));

        snapshot
    }
}

impl Default for WindowAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn reading(sensor_id: &str, temperature: f64, humidity: f64) -> Reading {
        Reading::new(sensor_id, temperature, humidity)
    }

    #[test]
    fn test_averages_are_arithmetic_means() {
        let mut agg = WindowAggregator::new();
        agg.add(&reading("sensor1", 20.0, 40.0));
        agg.add(&reading("sensor2", 24.0, 60.0));

        let snapshot = agg.close_window();

        assert_eq!(snapshot.sample_count, 2);
        assert!((snapshot.average_temperature - 22.0).abs() < EPSILON);
        assert!((snapshot.average_humidity - 50.0).abs() < EPSILON);
    }

    #[test]
    fn test_first_empty_window_reports_zero() {
        let mut agg = WindowAggregator::new();
        let snapshot = agg.close_window();

        assert_eq!(snapshot.sample_count, 0);
        assert!(snapshot.average_temperature.abs() < EPSILON);
        assert!(snapshot.average_humidity.abs() < EPSILON);
        assert!(snapshot.sensor_ids.is_empty());
    }

    #[test]
    fn test_empty_window_carries_previous_average() {
        let mut agg = WindowAggregator::new();
        agg.add(&reading("sensor1", 25.0, 55.0));
        agg.close_window();

        let snapshot = agg.close_window();

        assert_eq!(snapshot.sample_count, 0);
        assert!((snapshot.average_temperature - 25.0).abs() < EPSILON);
        assert!((snapshot.average_humidity - 55.0).abs() < EPSILON);
    }

    #[test]
    fn test_close_resets_running_state() {
        let mut agg = WindowAggregator::new();
        agg.add(&reading("sensor1", 20.0, 40.0));
        agg.close_window();

        assert!(agg.is_empty());

        agg.add(&reading("sensor2", 30.0, 70.0));
        let snapshot = agg.close_window();

        // Only the new window's reading counts toward its average
        assert_eq!(snapshot.sample_count, 1);
        assert!((snapshot.average_temperature - 30.0).abs() < EPSILON);
        assert_eq!(snapshot.sensor_ids, vec!["sensor2".to_string()]);
    }

    #[test]
    fn test_sensor_ids_deduplicated_and_sorted() {
        let mut agg = WindowAggregator::new();
        agg.add(&reading("sensor2", 20.0, 40.0));
        agg.add(&reading("sensor1", 21.0, 41.0));
        agg.add(&reading("sensor2", 22.0, 42.0));

        let snapshot = agg.close_window();

        assert_eq!(
            snapshot.sensor_ids,
            vec!["sensor1".to_string(), "sensor2".to_string()]
        );
    }

    #[test]
    fn test_window_boundaries_chain() {
        let mut agg = WindowAggregator::new();
        let first = agg.close_window();
        let second = agg.close_window();

        assert_eq!(first.window_end, second.window_start);
        assert!(second.window_end >= second.window_start);
    }
}
