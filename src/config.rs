//! Configuration types for order-pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Inclusive range a simulated delay is drawn from
///
/// A range of `0..=0` disables the delay entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    /// Shortest delay (milliseconds when serialized)
    #[serde(with = "duration_ms_serde")]
    pub min: Duration,

    /// Longest delay (milliseconds when serialized)
    #[serde(with = "duration_ms_serde")]
    pub max: Duration,
}

impl DelayRange {
    /// Range between two millisecond bounds
    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    /// A range that never sleeps
    pub const fn zero() -> Self {
        Self::from_millis(0, 0)
    }

    /// Whether every sample from this range is zero
    pub fn is_zero(&self) -> bool {
        self.max.is_zero()
    }

    /// Draw a delay uniformly at millisecond granularity
    pub fn sample(&self) -> Duration {
        use rand::Rng;

        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn validate(&self, key: &str) -> Result<()> {
        if self.min > self.max {
            return Err(Error::config(
                key,
                format!(
                    "{}: min ({:?}) must not exceed max ({:?})",
                    key, self.min, self.max
                ),
            ));
        }
        Ok(())
    }
}

/// Largest `order_count` whose channels fit tokio's permit limit
///
/// The result channel holds twice the order count.
pub const MAX_ORDER_COUNT: usize = tokio::sync::Semaphore::MAX_PERMITS / 2;

/// Main configuration for a pipeline run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of orders to generate (default: 20)
    #[serde(default = "default_order_count")]
    pub order_count: usize,

    /// Number of concurrent workers (default: 10)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Maximum retry attempts per failed order (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Probability in `[0.0, 1.0]` that any attempt fails (default: 0.25)
    #[serde(default = "default_failure_probability")]
    pub failure_probability: f64,

    /// Latency of a first-pass processing attempt (default: 1..=1000 ms)
    #[serde(default = "default_processing_delay")]
    pub processing_delay: DelayRange,

    /// Latency of a retry attempt (default: 200..=800 ms)
    #[serde(default = "default_retry_delay")]
    pub retry_delay: DelayRange,

    /// Pause between generated orders (default: 1..=255 ms)
    #[serde(default = "default_generation_delay")]
    pub generation_delay: DelayRange,

    /// Capacity of the event broadcast channel (default: 1024)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            order_count: default_order_count(),
            worker_count: default_worker_count(),
            max_retries: default_max_retries(),
            failure_probability: default_failure_probability(),
            processing_delay: default_processing_delay(),
            retry_delay: default_retry_delay(),
            generation_delay: default_generation_delay(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl PipelineConfig {
    /// Configuration with every simulated delay disabled
    ///
    /// Useful for tests and benchmarks where only the coordination matters.
    pub fn without_delays() -> Self {
        Self {
            processing_delay: DelayRange::zero(),
            retry_delay: DelayRange::zero(),
            generation_delay: DelayRange::zero(),
            ..Self::default()
        }
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        if self.order_count > MAX_ORDER_COUNT {
            return Err(Error::config(
                "order_count",
                format!(
                    "order_count must not exceed {}, got {}",
                    MAX_ORDER_COUNT, self.order_count
                ),
            ));
        }
        if self.worker_count == 0 {
            return Err(Error::config("worker_count", "worker_count must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.failure_probability) {
            return Err(Error::config(
                "failure_probability",
                format!(
                    "failure_probability must be within [0.0, 1.0], got {}",
                    self.failure_probability
                ),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::config(
                "event_capacity",
                "event_capacity must be at least 1",
            ));
        }
        self.processing_delay.validate("processing_delay")?;
        self.retry_delay.validate("retry_delay")?;
        self.generation_delay.validate("generation_delay")?;
        Ok(())
    }

    /// Parse and validate a JSON configuration; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

fn default_order_count() -> usize {
    20
}

fn default_worker_count() -> usize {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_failure_probability() -> f64 {
    0.25
}

fn default_processing_delay() -> DelayRange {
    DelayRange::from_millis(1, 1000)
}

fn default_retry_delay() -> DelayRange {
    DelayRange::from_millis(200, 800)
}

fn default_generation_delay() -> DelayRange {
    DelayRange::from_millis(1, 255)
}

fn default_event_capacity() -> usize {
    1024
}

// Duration serialization helper (milliseconds)
pub(crate) mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.order_count, 20);
        assert_eq!(config.worker_count, 10);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.failure_probability, 0.25);
        assert_eq!(config.processing_delay, DelayRange::from_millis(1, 1000));
        assert_eq!(config.retry_delay, DelayRange::from_millis(200, 800));
        assert_eq!(config.generation_delay, DelayRange::from_millis(1, 255));
        config.validate().unwrap();
    }

    #[test]
    fn zero_workers_rejected() {
        let config = PipelineConfig {
            worker_count: 0,
            ..PipelineConfig::default()
        };
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("worker_count")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn order_count_beyond_channel_limit_rejected() {
        let config = PipelineConfig {
            order_count: MAX_ORDER_COUNT + 1,
            ..PipelineConfig::without_delays()
        };
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("order_count")),
            other => panic!("expected config error, got {:?}", other),
        }

        let at_limit = PipelineConfig {
            order_count: MAX_ORDER_COUNT,
            ..PipelineConfig::without_delays()
        };
        at_limit.validate().unwrap();
    }

    #[test]
    fn probability_out_of_range_rejected() {
        for p in [-0.1, 1.5, f64::NAN] {
            let config = PipelineConfig {
                failure_probability: p,
                ..PipelineConfig::default()
            };
            assert!(config.validate().is_err(), "p = {} should be rejected", p);
        }
    }

    #[test]
    fn inverted_delay_range_rejected() {
        let config = PipelineConfig {
            retry_delay: DelayRange::from_millis(500, 100),
            ..PipelineConfig::default()
        };
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("retry_delay")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn json_fills_missing_keys_with_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{"order_count": 5, "failure_probability": 1.0,
                "processing_delay": {"min": 0, "max": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.order_count, 5);
        assert_eq!(config.failure_probability, 1.0);
        assert_eq!(config.processing_delay, DelayRange::from_millis(0, 10));
        assert_eq!(config.worker_count, 10);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn json_with_invalid_values_fails_validation() {
        let err = tokio_test::assert_err!(PipelineConfig::from_json_str(r#"{"worker_count": 0}"#));
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let result = PipelineConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"worker_count": 3, "max_retries": 4}}"#).unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.max_retries, 4);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PipelineConfig::from_json_file(dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn delay_samples_stay_in_range() {
        let range = DelayRange::from_millis(10, 20);
        for _ in 0..100 {
            let d = range.sample();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
        assert_eq!(DelayRange::zero().sample(), Duration::ZERO);
        assert!(DelayRange::zero().is_zero());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = PipelineConfig::without_delays();
        let json = serde_json::to_string(&config).unwrap();
        let parsed = PipelineConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
