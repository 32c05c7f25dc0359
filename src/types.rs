//! Core types for order-pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProcessError;

/// Unique identifier for an order (1..=N in generation order)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl OrderId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work flowing through the pipeline
///
/// Orders are created once by the generator and only read afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order ID
    pub id: OrderId,
    /// Customer who placed the order
    pub customer_name: String,
    /// Ordered item names
    pub items: Vec<String>,
    /// Sum of item prices
    pub total_amount: f64,
}

/// Which attempt a processor is being asked to make
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempt {
    /// First pass through the worker pool
    First,
    /// Retry number `n` (1-based) inside the retry stage
    Retry(u32),
}

/// Outcome of processing an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The order was processed
    Success {
        /// Time spent on the attempt that succeeded
        #[serde(with = "crate::config::duration_ms_serde")]
        process_time: Duration,
    },
    /// The order failed
    Failure {
        /// Time spent on the attempt that failed
        #[serde(with = "crate::config::duration_ms_serde")]
        process_time: Duration,
        /// Why it failed
        error: ProcessError,
    },
}

impl Outcome {
    /// Whether this is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Processing time of the attempt
    pub fn process_time(&self) -> Duration {
        match self {
            Outcome::Success { process_time } | Outcome::Failure { process_time, .. } => {
                *process_time
            }
        }
    }

    /// The failure reason, if any
    pub fn error(&self) -> Option<&ProcessError> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { error, .. } => Some(error),
        }
    }
}

/// Terminal result for one order
///
/// Exactly one of these reaches the collector per generated order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Order ID
    pub order_id: OrderId,
    /// Customer who placed the order
    pub customer_name: String,
    /// Retry attempts made before this result (0 for a first-pass success)
    pub retries: u32,
    /// Final outcome
    pub outcome: Outcome,
}

impl ProcessResult {
    /// Build a terminal result for `order`
    pub fn new(order: &Order, retries: u32, outcome: Outcome) -> Self {
        Self {
            order_id: order.id,
            customer_name: order.customer_name.clone(),
            retries,
            outcome,
        }
    }

    /// Whether the order ended successfully
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Aggregate statistics reported once the pipeline completes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Number of orders the pipeline was asked to generate
    pub requested: usize,
    /// Number of distinct orders finalized
    pub total: usize,
    /// Orders that ended in success
    pub successful: usize,
    /// Orders that ended in failure
    pub failed: usize,
    /// Duplicate results that were ignored
    pub duplicates_ignored: usize,
    /// Retry attempts reported by finalized results
    pub retry_attempts: u64,
    /// Sum of terminal-attempt processing times
    #[serde(with = "crate::config::duration_ms_serde")]
    pub total_processing_time: Duration,
    /// Whether cancellation was requested before the run finished
    pub cancelled: bool,
    /// When the collector started
    pub started_at: DateTime<Utc>,
    /// When the last order was finalized
    pub finished_at: DateTime<Utc>,
}

impl PipelineStats {
    /// Percentage of finalized orders that succeeded (0.0 when nothing finalized)
    pub fn success_rate(&self) -> f64 {
        percentage(self.successful, self.total)
    }

    /// Percentage of finalized orders that failed (0.0 when nothing finalized)
    pub fn failure_rate(&self) -> f64 {
        percentage(self.failed, self.total)
    }

    /// Mean processing time per finalized order
    pub fn average_processing_time(&self) -> Option<Duration> {
        let total = u32::try_from(self.total).ok().filter(|t| *t > 0)?;
        Some(self.total_processing_time / total)
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Event emitted while the pipeline runs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The generator produced an order
    OrderGenerated {
        /// Order ID
        id: OrderId,
        /// Customer name
        customer_name: String,
        /// Number of items in the order
        item_count: usize,
        /// Order total
        total_amount: f64,
    },

    /// The generator finished and closed the work queue
    GenerationComplete {
        /// Orders generated
        count: usize,
    },

    /// A worker dequeued an order
    OrderPickedUp {
        /// Worker number (1-based)
        worker_id: usize,
        /// Order ID
        id: OrderId,
    },

    /// A worker processed an order on the first attempt
    OrderSucceeded {
        /// Worker number (1-based)
        worker_id: usize,
        /// Order ID
        id: OrderId,
        /// Processing time in milliseconds
        process_time_ms: u64,
    },

    /// A worker's first attempt failed and the order went to the retry stage
    OrderAttemptFailed {
        /// Worker number (1-based)
        worker_id: usize,
        /// Order ID
        id: OrderId,
        /// Failure reason
        error: String,
    },

    /// The retry stage started a retry attempt
    RetryAttempt {
        /// Order ID
        id: OrderId,
        /// Attempt number (1-based)
        attempt: u32,
        /// Configured maximum
        max_retries: u32,
    },

    /// A retry attempt succeeded
    RetrySucceeded {
        /// Order ID
        id: OrderId,
        /// Attempt that succeeded
        attempt: u32,
    },

    /// An order reached a terminal failure
    OrderFailed {
        /// Order ID
        id: OrderId,
        /// Failure reason
        error: String,
    },

    /// The collector dropped a second result for an already finalized order
    DuplicateResult {
        /// Order ID
        id: OrderId,
    },

    /// Every generated order has a terminal result
    Completed {
        /// Final statistics
        stats: PipelineStats,
    },

    /// Cancellation was requested
    Cancelled,
}
