//! Retry stage: one serialized consumer of failed orders.
//!
//! Retries are expected to be rare, so the stage runs as a single task. That
//! keeps the [`RetryLedger`] exclusively owned and lock-free; parallelizing
//! retries would require sharding the ledger by order id.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::worker::{finalize_failure, send_result};
use crate::error::{ProcessError, Result};
use crate::processor::OrderProcessor;
use crate::retry::{IsRetryable, RetryDecision, RetryLedger};
use crate::types::{Attempt, Event, Order, Outcome, ProcessResult};

/// Everything the retry task needs
pub(crate) struct RetryContext {
    /// Failed orders from the worker pool
    pub(crate) retry_rx: mpsc::Receiver<Order>,
    /// Processing step
    pub(crate) processor: Arc<dyn OrderProcessor>,
    /// Terminal results go here
    pub(crate) result_tx: mpsc::Sender<ProcessResult>,
    /// Retry attempts allowed per order
    pub(crate) max_retries: u32,
    /// Event channel
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Once cancelled, queued retries are finalized without another attempt
    pub(crate) cancel_token: CancellationToken,
}

/// Summary returned when the retry stage drains
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryReport {
    /// Distinct orders that entered the stage
    pub(crate) orders: usize,
    /// Retry attempts made across all orders
    pub(crate) attempts: u64,
}

/// Retry failed orders until the input is closed and every resubmission settled
///
/// Orders whose attempt fails with retries remaining go back to the end of the
/// stage's pending queue, so the stage only returns once the worker pool has
/// closed its input and nothing is left pending.
pub(crate) async fn run_retry_stage(ctx: RetryContext) -> Result<RetryReport> {
    let RetryContext {
        mut retry_rx,
        processor,
        result_tx,
        max_retries,
        event_tx,
        cancel_token,
    } = ctx;

    let mut ledger = RetryLedger::new(max_retries);
    let mut pending: VecDeque<Order> = VecDeque::new();
    let mut attempts = 0u64;

    loop {
        // Keep arrival order: new failures queue behind resubmitted ones
        while let Ok(order) = retry_rx.try_recv() {
            pending.push_back(order);
        }
        let order = match pending.pop_front() {
            Some(order) => order,
            None => match retry_rx.recv().await {
                Some(order) => order,
                None => break,
            },
        };

        if cancel_token.is_cancelled() {
            let retries = ledger.attempts(order.id);
            let outcome = Outcome::Failure {
                process_time: Duration::ZERO,
                error: ProcessError::Cancelled,
            };
            finalize_failure(&result_tx, &event_tx, ProcessResult::new(&order, retries, outcome))
                .await?;
            continue;
        }

        let attempt = match ledger.record_failure(order.id) {
            RetryDecision::Attempt(attempt) => attempt,
            RetryDecision::Exhausted { attempts: made } => {
                tracing::debug!(order_id = %order.id, made, "Retries exhausted, finalizing without another attempt");
                let outcome = Outcome::Failure {
                    process_time: Duration::ZERO,
                    error: ProcessError::RetriesExhausted { attempts: made },
                };
                finalize_failure(&result_tx, &event_tx, ProcessResult::new(&order, made, outcome))
                    .await?;
                continue;
            }
        };

        attempts += 1;
        let max_retries = ledger.max_retries();
        tracing::info!(order_id = %order.id, attempt, max_retries, "Retry attempt ({}/{}) for order #{}", attempt, max_retries, order.id);
        super::emit(
            &event_tx,
            Event::RetryAttempt {
                id: order.id,
                attempt,
                max_retries,
            },
        );

        match processor.process(&order, Attempt::Retry(attempt)).await {
            Outcome::Success { process_time } => {
                tracing::info!(order_id = %order.id, attempt, "Retry successful");
                super::emit(
                    &event_tx,
                    Event::RetrySucceeded {
                        id: order.id,
                        attempt,
                    },
                );
                let result = ProcessResult::new(&order, attempt, Outcome::Success { process_time });
                send_result(&result_tx, result).await?;
            }
            Outcome::Failure { error, .. }
                if error.is_retryable() && !ledger.is_last_attempt(attempt) =>
            {
                tracing::debug!(order_id = %order.id, attempt, error = %error, "Retry failed, resubmitting");
                pending.push_back(order);
            }
            Outcome::Failure {
                process_time,
                error,
            } => {
                let error = if error.is_retryable() {
                    ProcessError::RetriesExhausted { attempts: attempt }
                } else {
                    error
                };
                tracing::warn!(order_id = %order.id, attempt, error = %error, "Order failed after retrying");
                let outcome = Outcome::Failure {
                    process_time,
                    error,
                };
                finalize_failure(&result_tx, &event_tx, ProcessResult::new(&order, attempt, outcome))
                    .await?;
            }
        }
    }

    let report = RetryReport {
        orders: ledger.tracked_orders(),
        attempts,
    };
    tracing::debug!(orders = report.orders, attempts = report.attempts, "Retry stage drained");
    Ok(report)
}
