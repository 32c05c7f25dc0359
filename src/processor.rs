//! Order processing
//!
//! Workers and the retry stage both go through an [`OrderProcessor`]. The
//! default [`SimulatedProcessor`] sleeps for a random latency and then fails
//! with a configured probability.

use rand::Rng;

use crate::config::{DelayRange, PipelineConfig};
use crate::error::ProcessError;
use crate::types::{Attempt, Order, Outcome};

/// Abstraction over the processing step, enabling testability.
#[async_trait::async_trait]
pub trait OrderProcessor: Send + Sync {
    /// Make one processing attempt for `order`
    ///
    /// Failures are reported in the returned [`Outcome`]; the pipeline decides
    /// whether they are retried.
    async fn process(&self, order: &Order, attempt: Attempt) -> Outcome;
}

/// Processor with random latency and a fixed failure probability
#[derive(Clone, Debug)]
pub struct SimulatedProcessor {
    failure_probability: f64,
    processing_delay: DelayRange,
    retry_delay: DelayRange,
}

impl SimulatedProcessor {
    /// Create a processor
    ///
    /// `failure_probability` is clamped to `[0.0, 1.0]`.
    pub fn new(failure_probability: f64, processing_delay: DelayRange, retry_delay: DelayRange) -> Self {
        let failure_probability = if failure_probability.is_nan() {
            0.0
        } else {
            failure_probability.clamp(0.0, 1.0)
        };
        Self {
            failure_probability,
            processing_delay,
            retry_delay,
        }
    }

    /// Processor matching a pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.failure_probability,
            config.processing_delay,
            config.retry_delay,
        )
    }

    fn roll_failure(&self) -> bool {
        rand::thread_rng().gen_bool(self.failure_probability)
    }
}

#[async_trait::async_trait]
impl OrderProcessor for SimulatedProcessor {
    async fn process(&self, order: &Order, attempt: Attempt) -> Outcome {
        let delay = match attempt {
            Attempt::First => self.processing_delay.sample(),
            Attempt::Retry(_) => self.retry_delay.sample(),
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.roll_failure() {
            tracing::trace!(order_id = %order.id, ?attempt, "simulated processing failure");
            Outcome::Failure {
                process_time: delay,
                error: ProcessError::Transient,
            }
        } else {
            Outcome::Success {
                process_time: delay,
            }
        }
    }
}
