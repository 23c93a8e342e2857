//! Simulated sensor emitter.
//!
//! Generates environmental readings with an occasional out-of-range spike and
//! streams them to the drone as newline-delimited JSON, reconnecting with a
//! fixed delay whenever the link drops. The drone treats this as any other
//! sensor; it exists so the system can be exercised end to end without
//! hardware.

use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::types::Reading;

/// Delay between reconnect attempts
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Configuration for the reading generator.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Sensor identifier carried in every reading
    pub sensor_id: String,

    /// Normal temperature range in Celsius
    pub temperature_range: (f64, f64),

    /// Normal humidity range in percent
    pub humidity_range: (f64, f64),

    /// Probability (0.0 - 1.0) of emitting an out-of-range spike
    pub spike_rate: f64,

    /// Interval between readings
    pub interval: Duration,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            sensor_id: "sensor1".to_string(),
            temperature_range: (20.0, 30.0),
            humidity_range: (30.0, 70.0),
            spike_rate: 0.02,
            interval: Duration::from_secs(1),
        }
    }
}

/// Generates random readings within configured ranges.
pub struct ReadingGenerator {
    config: EmitterConfig,
}

impl ReadingGenerator {
    pub fn new(config: EmitterConfig) -> Self {
        Self { config }
    }

    /// Generate a single reading, occasionally spiking out of range.
    pub fn generate(&self) -> Reading {
        let mut rng = rand::thread_rng();

        let temperature = if rng.gen_bool(self.config.spike_rate) {
            // Well outside any plausible bounds, guaranteed anomalous
            rng.gen_range(200.0..1000.0)
        } else {
            let (lo, hi) = self.config.temperature_range;
            rng.gen_range(lo..hi)
        };

        let (lo, hi) = self.config.humidity_range;
        let humidity = rng.gen_range(lo..hi);

        Reading::new(&self.config.sensor_id, temperature, humidity)
    }
}

/// Stream readings to the drone forever, reconnecting on failure.
pub async fn run_emitter(drone_addr: SocketAddr, config: EmitterConfig) {
    let generator = ReadingGenerator::new(config.clone());
    let mut ticker = tokio::time::interval(config.interval);

    loop {
        let mut stream = connect_with_retry(drone_addr, &config.sensor_id).await;

        loop {
            ticker.tick().await;
            let reading = generator.generate();

            let line = match serde_json::to_string(&reading) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize reading");
                    continue;
                }
            };

            let result = async {
                stream.write_all(line.as_bytes()).await?;
                stream.write_all(b"\n").await?;
                stream.flush().await
            }
            .await;

            match result {
                Ok(()) => {
                    debug!(
                        sensor_id = %reading.sensor_id,
                        temperature = reading.temperature,
                        humidity = reading.humidity,
                        "Reading sent"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Send failed, reconnecting");
                    break;
                }
            }
        }
    }
}

async fn connect_with_retry(drone_addr: SocketAddr, sensor_id: &str) -> TcpStream {
    loop {
        match TcpStream::connect(drone_addr).await {
            Ok(stream) => {
                info!(sensor_id = %sensor_id, drone = %drone_addr, "Connected to drone");
                return stream;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    retry_secs = RECONNECT_DELAY.as_secs(),
                    "Connection to drone failed, retrying"
                );
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_readings_stay_in_range_without_spikes() {
        let generator = ReadingGenerator::new(EmitterConfig {
            spike_rate: 0.0,
            ..EmitterConfig::default()
        });

        for _ in 0..100 {
            let reading = generator.generate();
            assert_eq!(reading.sensor_id, "sensor1");
            assert!(reading.temperature >= 20.0 && reading.temperature < 30.0);
            assert!(reading.humidity >= 30.0 && reading.humidity < 70.0);
        }
    }

    #[test]
    fn test_spikes_exceed_default_bounds() {
        let generator = ReadingGenerator::new(EmitterConfig {
            spike_rate: 1.0,
            ..EmitterConfig::default()
        });

        for _ in 0..20 {
            let reading = generator.generate();
            assert!(reading.temperature >= 200.0);
        }
    }

    #[test]
    fn test_readings_serialize_to_the_wire_format() {
        let generator = ReadingGenerator::new(EmitterConfig::default());
        let line = serde_json::to_string(&generator.generate()).unwrap();

        assert!(line.contains(r#""sensor_id":"sensor1""#));
        assert!(line.contains(r#""temperature""#));
        assert!(line.contains(r#""humidity""#));
        assert!(line.contains(r#""timestamp""#));
    }
}
