//! Worker pool: drains the work queue and routes first-pass outcomes.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ProcessError, Result};
use crate::processor::OrderProcessor;
use crate::retry::IsRetryable;
use crate::types::{Attempt, Event, Order, Outcome, ProcessResult};

/// Receiving half of the work queue, shared by every worker
///
/// The mutex is only held across `recv`, so at most one worker ever dequeues
/// a given order.
pub(crate) type WorkQueue = Arc<Mutex<mpsc::Receiver<Order>>>;

/// Everything one worker task needs
pub(crate) struct WorkerContext {
    /// Worker number (1-based)
    pub(crate) worker_id: usize,
    /// Shared work queue
    pub(crate) queue: WorkQueue,
    /// Processing step
    pub(crate) processor: Arc<dyn OrderProcessor>,
    /// Failed orders go here
    pub(crate) retry_tx: mpsc::Sender<Order>,
    /// Terminal results go here
    pub(crate) result_tx: mpsc::Sender<ProcessResult>,
    /// Event channel
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Once cancelled, remaining orders are finalized without processing
    pub(crate) cancel_token: CancellationToken,
}

/// Run one worker until the work queue is closed and drained
///
/// Returns the number of orders this worker dequeued.
pub(crate) async fn run_worker(ctx: WorkerContext) -> Result<usize> {
    let WorkerContext {
        worker_id,
        queue,
        processor,
        retry_tx,
        result_tx,
        event_tx,
        cancel_token,
    } = ctx;

    let mut handled = 0;
    loop {
        let next = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };
        let Some(order) = next else {
            break;
        };
        handled += 1;

        if cancel_token.is_cancelled() {
            let outcome = Outcome::Failure {
                process_time: std::time::Duration::ZERO,
                error: ProcessError::Cancelled,
            };
            finalize_failure(&result_tx, &event_tx, ProcessResult::new(&order, 0, outcome)).await?;
            continue;
        }

        tracing::debug!(worker_id, order_id = %order.id, customer = %order.customer_name, "Worker processing order");
        super::emit(
            &event_tx,
            Event::OrderPickedUp {
                worker_id,
                id: order.id,
            },
        );

        match processor.process(&order, Attempt::First).await {
            Outcome::Success { process_time } => {
                tracing::debug!(worker_id, order_id = %order.id, ?process_time, "Order processed");
                super::emit(
                    &event_tx,
                    Event::OrderSucceeded {
                        worker_id,
                        id: order.id,
                        process_time_ms: process_time.as_millis() as u64,
                    },
                );
                let result = ProcessResult::new(&order, 0, Outcome::Success { process_time });
                send_result(&result_tx, result).await?;
            }
            Outcome::Failure { error, .. } if error.is_retryable() => {
                tracing::debug!(worker_id, order_id = %order.id, error = %error, "Order failed, handing to retry stage");
                super::emit(
                    &event_tx,
                    Event::OrderAttemptFailed {
                        worker_id,
                        id: order.id,
                        error: error.to_string(),
                    },
                );
                let id = order.id;
                if retry_tx.send(order).await.is_err() {
                    return Err(Error::Protocol(format!(
                        "retry stream closed while worker {} still held order {}",
                        worker_id, id
                    )));
                }
            }
            outcome @ Outcome::Failure { .. } => {
                finalize_failure(&result_tx, &event_tx, ProcessResult::new(&order, 0, outcome)).await?;
            }
        }
    }

    tracing::debug!(worker_id, handled, "Worker exiting, work queue drained");
    Ok(handled)
}

/// Deliver a terminal failure and announce it
pub(crate) async fn finalize_failure(
    result_tx: &mpsc::Sender<ProcessResult>,
    event_tx: &broadcast::Sender<Event>,
    result: ProcessResult,
) -> Result<()> {
    if let Some(error) = result.outcome.error() {
        tracing::debug!(order_id = %result.order_id, error = %error, "Order failed permanently");
        super::emit(
            event_tx,
            Event::OrderFailed {
                id: result.order_id,
                error: error.to_string(),
            },
        );
    }
    send_result(result_tx, result).await
}

/// Deliver a terminal result to the collector
pub(crate) async fn send_result(
    result_tx: &mpsc::Sender<ProcessResult>,
    result: ProcessResult,
) -> Result<()> {
    let id = result.order_id;
    result_tx.send(result).await.map_err(|_| {
        Error::Protocol(format!(
            "result stream closed before order {} was finalized",
            id
        ))
    })
}
