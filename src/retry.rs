//! Bounded retry bookkeeping
//!
//! The retry stage is the single owner of a [`RetryLedger`]. Every failed
//! order that reaches the stage is recorded here, and the ledger decides
//! whether another attempt is allowed or the order is exhausted.
//!
//! # Example
//!
//! ```
//! use order_pipeline::retry::{RetryDecision, RetryLedger};
//! use order_pipeline::types::OrderId;
//!
//! let mut ledger = RetryLedger::new(2);
//! assert_eq!(ledger.record_failure(OrderId(1)), RetryDecision::Attempt(1));
//! assert_eq!(ledger.record_failure(OrderId(1)), RetryDecision::Attempt(2));
//! assert_eq!(
//!     ledger.record_failure(OrderId(1)),
//!     RetryDecision::Exhausted { attempts: 2 }
//! );
//! ```

use std::collections::HashMap;

use crate::error::ProcessError;
use crate::types::OrderId;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the failure is transient and the order should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ProcessError {
    fn is_retryable(&self) -> bool {
        match self {
            ProcessError::Transient => true,
            // Already terminal
            ProcessError::RetriesExhausted { .. } => false,
            ProcessError::Cancelled => false,
        }
    }
}

/// What the retry stage should do with a failed order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Make retry attempt number `n` (1-based)
    Attempt(u32),
    /// No attempts left; finalize as failed
    Exhausted {
        /// Retry attempts that were actually made
        attempts: u32,
    },
}

/// Per-order retry counts
///
/// Not thread-safe on purpose: it lives inside the single retry task and is
/// never shared.
#[derive(Debug)]
pub struct RetryLedger {
    max_retries: u32,
    counts: HashMap<OrderId, u32>,
}

impl RetryLedger {
    /// Create a ledger allowing `max_retries` attempts per order
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            counts: HashMap::new(),
        }
    }

    /// Configured maximum
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Record that `id` failed and decide on the next step
    ///
    /// Counts only ever grow. Once the count passes `max_retries` the order is
    /// exhausted no matter how many more times it is reported.
    pub fn record_failure(&mut self, id: OrderId) -> RetryDecision {
        let count = self.counts.entry(id).or_insert(0);
        *count = count.saturating_add(1);

        if *count > self.max_retries {
            RetryDecision::Exhausted {
                attempts: self.max_retries,
            }
        } else {
            RetryDecision::Attempt(*count)
        }
    }

    /// Whether attempt `attempt` was the last one allowed
    pub fn is_last_attempt(&self, attempt: u32) -> bool {
        attempt >= self.max_retries
    }

    /// Retry attempts recorded for `id` so far (capped at `max_retries`)
    pub fn attempts(&self, id: OrderId) -> u32 {
        self.counts
            .get(&id)
            .map_or(0, |count| (*count).min(self.max_retries))
    }

    /// Number of distinct orders that have entered the retry stage
    pub fn tracked_orders(&self) -> usize {
        self.counts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(ProcessError::Transient.is_retryable());
        assert!(!ProcessError::RetriesExhausted { attempts: 2 }.is_retryable());
        assert!(!ProcessError::Cancelled.is_retryable());
    }

    #[test]
    fn attempts_are_bounded() {
        let mut ledger = RetryLedger::new(3);
        let id = OrderId(9);
        assert_eq!(ledger.max_retries(), 3);

        assert_eq!(ledger.record_failure(id), RetryDecision::Attempt(1));
        assert_eq!(ledger.record_failure(id), RetryDecision::Attempt(2));
        assert_eq!(ledger.record_failure(id), RetryDecision::Attempt(3));
        assert!(ledger.is_last_attempt(3));
        assert_eq!(
            ledger.record_failure(id),
            RetryDecision::Exhausted { attempts: 3 }
        );
        // Further reports stay exhausted
        assert_eq!(
            ledger.record_failure(id),
            RetryDecision::Exhausted { attempts: 3 }
        );
        assert_eq!(ledger.attempts(id), 3);
    }

    #[test]
    fn zero_retries_exhausts_immediately() {
        let mut ledger = RetryLedger::new(0);
        assert_eq!(
            ledger.record_failure(OrderId(1)),
            RetryDecision::Exhausted { attempts: 0 }
        );
        assert_eq!(ledger.attempts(OrderId(1)), 0);
    }

    #[test]
    fn orders_are_tracked_independently() {
        let mut ledger = RetryLedger::new(1);
        assert_eq!(ledger.record_failure(OrderId(1)), RetryDecision::Attempt(1));
        assert_eq!(ledger.record_failure(OrderId(2)), RetryDecision::Attempt(1));
        assert_eq!(ledger.tracked_orders(), 2);
        assert_eq!(ledger.attempts(OrderId(3)), 0);
    }
}
