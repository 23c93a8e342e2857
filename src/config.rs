//! Configuration module for the drone edge aggregator.
//!
//! All settings are loaded from environment variables with validated parsing
//! and sensible defaults. Invalid values are fatal at startup.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Default drone identifier
const DEFAULT_DRONE_ID: &str = "drone1";

/// Default listen address for inbound sensor links
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:6001";

/// Default address of the central sink
const DEFAULT_SINK_ADDR: &str = "127.0.0.1:7001";

/// Default aggregation window period in seconds
const DEFAULT_WINDOW_PERIOD_SECS: u64 = 5;

/// Default battery depletion cadence in seconds
const DEFAULT_BATTERY_TICK_SECS: u64 = 1;

/// Default battery drain per tick, in percent
const DEFAULT_DEPLETION_RATE: f64 = 1.0;

/// Default battery thresholds, in percent
const DEFAULT_LOW_THRESHOLD: f64 = 30.0;
const DEFAULT_CRITICAL_THRESHOLD: f64 = 10.0;

/// Default anomaly bounds per metric
const DEFAULT_TEMP_BOUNDS: (f64, f64) = (-50.0, 60.0);
const DEFAULT_HUMIDITY_BOUNDS: (f64, f64) = (0.0, 100.0);

/// Default capacity of the RETURNING-mode summary queue
const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default idle-link timeout in seconds
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

/// Default retry budget for summary delivery
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for delivery backoff, in milliseconds
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Bounds on the window period to keep the pipeline responsive
const MIN_WINDOW_PERIOD_SECS: u64 = 1;
const MAX_WINDOW_PERIOD_SECS: u64 = 300;

/// What the forwarder does with summaries while the drone is returning to base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturningPolicy {
    /// Buffer summaries in order, capped, oldest dropped on overflow,
    /// flushed on recovery
    Queue,

    /// Drop new summaries and log the drop
    Discard,
}

impl std::fmt::Display for ReturningPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReturningPolicy::Queue => write!(f, "queue"),
            ReturningPolicy::Discard => write!(f, "discard"),
        }
    }
}

/// Inclusive lower/upper bounds for one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether a value lies within [min, max].
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Error type for configuration loading failures.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub env_var: Option<String>,
}

impl ConfigError {
    fn new(env_var: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            env_var: Some(env_var.to_string()),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.env_var {
            Some(var) => write!(f, "Configuration error for {}: {}", var, self.message),
            None => write!(f, "Configuration error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the drone edge aggregator.
///
/// All settings can be configured via environment variables:
/// - `DRONE_ID`: drone identifier reported in summaries (default: drone1)
/// - `DRONE_LISTEN_ADDR`: bind address for sensor links (default: 0.0.0.0:6001)
/// - `DRONE_SINK_ADDR`: central sink address (default: 127.0.0.1:7001)
/// - `DRONE_WINDOW_PERIOD_SECS`: aggregation window period (default: 5)
/// - `DRONE_BATTERY_TICK_SECS`: battery depletion cadence (default: 1)
/// - `DRONE_BATTERY_DEPLETION_RATE`: percent drained per tick (default: 1.0)
/// - `DRONE_BATTERY_LOW_THRESHOLD`: level at or below which mode is LOW (default: 30)
/// - `DRONE_BATTERY_CRITICAL_THRESHOLD`: level at or below which mode is RETURNING (default: 10)
/// - `DRONE_TEMP_BOUNDS`: "min,max" anomaly bounds for temperature (default: -50,60)
/// - `DRONE_HUMIDITY_BOUNDS`: "min,max" anomaly bounds for humidity (default: 0,100)
/// - `DRONE_RETURNING_POLICY`: `queue` or `discard` (default: queue)
/// - `DRONE_QUEUE_CAPACITY`: RETURNING-mode queue capacity (default: 10)
/// - `DRONE_IDLE_TIMEOUT_SECS`: idle-link timeout (default: 30)
/// - `DRONE_MAX_RETRIES`: delivery retry attempts (default: 3)
/// - `DRONE_BACKOFF_BASE_MS`: base delay for delivery backoff (default: 500)
#[derive(Debug, Clone)]
pub struct Config {
    pub drone_id: String,
    pub listen_addr: SocketAddr,
    pub sink_addr: SocketAddr,
    pub window_period: Duration,
    pub battery_tick: Duration,
    pub depletion_rate: f64,
    pub low_threshold: f64,
    pub critical_threshold: f64,
    pub temperature_bounds: Bounds,
    pub humidity_bounds: Bounds,
    pub returning_policy: ReturningPolicy,
    pub queue_capacity: usize,
    pub idle_timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any variable is present but malformed, or if
    /// the battery thresholds are not ordered `critical < low`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let drone_id = env::var("DRONE_ID").unwrap_or_else(|_| DEFAULT_DRONE_ID.to_string());

        let listen_addr = parse_addr("DRONE_LISTEN_ADDR", env_opt("DRONE_LISTEN_ADDR"))?
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.parse().expect("default addr is valid"));
        let sink_addr = parse_addr("DRONE_SINK_ADDR", env_opt("DRONE_SINK_ADDR"))?
            .unwrap_or_else(|| DEFAULT_SINK_ADDR.parse().expect("default addr is valid"));

        let window_period =
            Duration::from_secs(parse_window_period(env_opt("DRONE_WINDOW_PERIOD_SECS"))?);
        let battery_tick = Duration::from_secs(
            parse_u64("DRONE_BATTERY_TICK_SECS", env_opt("DRONE_BATTERY_TICK_SECS"))?
                .unwrap_or(DEFAULT_BATTERY_TICK_SECS),
        );

        let depletion_rate = parse_f64(
            "DRONE_BATTERY_DEPLETION_RATE",
            env_opt("DRONE_BATTERY_DEPLETION_RATE"),
        )?
        .unwrap_or(DEFAULT_DEPLETION_RATE);
        if depletion_rate <= 0.0 {
            return Err(ConfigError::new(
                "DRONE_BATTERY_DEPLETION_RATE",
                "depletion rate must be greater than 0",
            ));
        }

        let low_threshold = parse_f64(
            "DRONE_BATTERY_LOW_THRESHOLD",
            env_opt("DRONE_BATTERY_LOW_THRESHOLD"),
        )?
        .unwrap_or(DEFAULT_LOW_THRESHOLD);
        let critical_threshold = parse_f64(
            "DRONE_BATTERY_CRITICAL_THRESHOLD",
            env_opt("DRONE_BATTERY_CRITICAL_THRESHOLD"),
        )?
        .unwrap_or(DEFAULT_CRITICAL_THRESHOLD);
        if critical_threshold >= low_threshold {
            return Err(ConfigError::new(
                "DRONE_BATTERY_CRITICAL_THRESHOLD",
                format!(
                    "critical threshold {} must be below low threshold {}",
                    critical_threshold, low_threshold
                ),
            ));
        }

        let temperature_bounds = parse_bounds("DRONE_TEMP_BOUNDS", env_opt("DRONE_TEMP_BOUNDS"))?
            .unwrap_or(Bounds::new(DEFAULT_TEMP_BOUNDS.0, DEFAULT_TEMP_BOUNDS.1));
        let humidity_bounds =
            parse_bounds("DRONE_HUMIDITY_BOUNDS", env_opt("DRONE_HUMIDITY_BOUNDS"))?.unwrap_or(
                Bounds::new(DEFAULT_HUMIDITY_BOUNDS.0, DEFAULT_HUMIDITY_BOUNDS.1),
            );

        let returning_policy = parse_policy(env_opt("DRONE_RETURNING_POLICY"))?;

        let queue_capacity = parse_u64("DRONE_QUEUE_CAPACITY", env_opt("DRONE_QUEUE_CAPACITY"))?
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);
        if queue_capacity == 0 {
            return Err(ConfigError::new(
                "DRONE_QUEUE_CAPACITY",
                "queue capacity must be greater than 0",
            ));
        }

        let idle_timeout = Duration::from_secs(
            parse_u64("DRONE_IDLE_TIMEOUT_SECS", env_opt("DRONE_IDLE_TIMEOUT_SECS"))?
                .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS),
        );

        let max_retries = parse_u64("DRONE_MAX_RETRIES", env_opt("DRONE_MAX_RETRIES"))?
            .map(|v| v as u32)
            .unwrap_or(DEFAULT_MAX_RETRIES);

        let backoff_base = Duration::from_millis(
            parse_u64("DRONE_BACKOFF_BASE_MS", env_opt("DRONE_BACKOFF_BASE_MS"))?
                .unwrap_or(DEFAULT_BACKOFF_BASE_MS),
        );

        Ok(Self {
            drone_id,
            listen_addr,
            sink_addr,
            window_period,
            battery_tick,
            depletion_rate,
            low_threshold,
            critical_threshold,
            temperature_bounds,
            humidity_bounds,
            returning_policy,
            queue_capacity,
            idle_timeout,
            max_retries,
            backoff_base,
        })
    }
}

impl Default for Config {
    /// Create a default configuration using default values.
    ///
    /// This is useful for testing or when environment variables are not set.
    fn default() -> Self {
        Self {
            drone_id: DEFAULT_DRONE_ID.to_string(),
            listen_addr: DEFAULT_LISTEN_ADDR.parse().expect("default addr is valid"),
            sink_addr: DEFAULT_SINK_ADDR.parse().expect("default addr is valid"),
            window_period: Duration::from_secs(DEFAULT_WINDOW_PERIOD_SECS),
            battery_tick: Duration::from_secs(DEFAULT_BATTERY_TICK_SECS),
            depletion_rate: DEFAULT_DEPLETION_RATE,
            low_threshold: DEFAULT_LOW_THRESHOLD,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            temperature_bounds: Bounds::new(DEFAULT_TEMP_BOUNDS.0, DEFAULT_TEMP_BOUNDS.1),
            humidity_bounds: Bounds::new(DEFAULT_HUMIDITY_BOUNDS.0, DEFAULT_HUMIDITY_BOUNDS.1),
            returning_policy: ReturningPolicy::Queue,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn parse_addr(env_var: &str, raw: Option<String>) -> Result<Option<SocketAddr>, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::new(env_var, format!("'{}' is not a valid address", value))),
        None => Ok(None),
    }
}

fn parse_u64(env_var: &str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::new(env_var, format!("'{}' is not a valid number", value))),
        None => Ok(None),
    }
}

fn parse_f64(env_var: &str, raw: Option<String>) -> Result<Option<f64>, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::new(env_var, format!("'{}' is not a valid number", value))),
        None => Ok(None),
    }
}

/// Parse the window period with range validation.
fn parse_window_period(raw: Option<String>) -> Result<u64, ConfigError> {
    let env_var = "DRONE_WINDOW_PERIOD_SECS";

    match parse_u64(env_var, raw)? {
        Some(period) => {
            if period < MIN_WINDOW_PERIOD_SECS {
                return Err(ConfigError::new(
                    env_var,
                    format!(
                        "window period {} is below minimum ({}s)",
                        period, MIN_WINDOW_PERIOD_SECS
                    ),
                ));
            }
            if period > MAX_WINDOW_PERIOD_SECS {
                return Err(ConfigError::new(
                    env_var,
                    format!(
                        "window period {} exceeds maximum ({}s)",
                        period, MAX_WINDOW_PERIOD_SECS
                    ),
                ));
            }
            Ok(period)
        }
        None => Ok(DEFAULT_WINDOW_PERIOD_SECS),
    }
}

/// Parse a "min,max" bounds pair.
fn parse_bounds(env_var: &str, raw: Option<String>) -> Result<Option<Bounds>, ConfigError> {
    let value = match raw {
        Some(value) => value,
        None => return Ok(None),
    };

    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(ConfigError::new(
            env_var,
            format!("'{}' is not a 'min,max' pair", value),
        ));
    }

    let min: f64 = parts[0]
        .parse()
        .map_err(|_| ConfigError::new(env_var, format!("'{}' is not a valid number", parts[0])))?;
    let max: f64 = parts[1]
        .parse()
        .map_err(|_| ConfigError::new(env_var, format!("'{}' is not a valid number", parts[1])))?;

    if min >= max {
        return Err(ConfigError::new(
            env_var,
            format!("bounds minimum {} must be below maximum {}", min, max),
        ));
    }

    Ok(Some(Bounds::new(min, max)))
}

fn parse_policy(raw: Option<String>) -> Result<ReturningPolicy, ConfigError> {
    match raw.as_deref() {
        None => Ok(ReturningPolicy::Queue),
        Some("queue") => Ok(ReturningPolicy::Queue),
        Some("discard") => Ok(ReturningPolicy::Discard),
        Some(other) => Err(ConfigError::new(
            "DRONE_RETURNING_POLICY",
            format!(
                "'{}' is not a valid policy (expected 'queue' or 'discard')",
                other
            ),
        )),
    }
}
