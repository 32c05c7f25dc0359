//! Generator: emits the bounded order stream onto the work queue.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::DelayRange;
use crate::error::{Error, Result};
use crate::source::OrderSource;
use crate::types::{Event, Order, OrderId};

/// Everything the generator task needs
pub(crate) struct GeneratorContext {
    /// Number of orders to generate
    pub(crate) count: usize,
    /// Order contents
    pub(crate) source: Arc<dyn OrderSource>,
    /// Sending half of the work queue; dropping it closes the queue
    pub(crate) work_tx: mpsc::Sender<Order>,
    /// Pause between orders
    pub(crate) pacing: DelayRange,
    /// Event channel
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Stops generation early
    pub(crate) cancel_token: CancellationToken,
}

/// Generate orders `1..=count`, then close the work queue
///
/// Returns how many orders were actually queued, which is less than `count`
/// only when the pipeline was cancelled. The queue is closed on every exit
/// path because the context owns the only sender.
pub(crate) async fn run_generator(ctx: GeneratorContext) -> Result<usize> {
    let GeneratorContext {
        count,
        source,
        work_tx,
        pacing,
        event_tx,
        cancel_token,
    } = ctx;

    let mut generated = 0;
    for n in 1..=count as u64 {
        if cancel_token.is_cancelled() {
            tracing::info!(generated, requested = count, "Generation stopped by cancellation");
            break;
        }

        let id = OrderId(n);
        let order = source.next_order(id).ok_or(Error::SourceExhausted { id })?;
        let event = Event::OrderGenerated {
            id,
            customer_name: order.customer_name.clone(),
            item_count: order.items.len(),
            total_amount: order.total_amount,
        };

        if work_tx.send(order).await.is_err() {
            return Err(Error::Protocol(format!(
                "work queue closed before order {} was queued",
                id
            )));
        }
        generated += 1;
        tracing::debug!(order_id = %id, "Generated order");
        super::emit(&event_tx, event);

        if generated < count {
            let delay = pacing.sample();
            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel_token.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    drop(work_tx);
    tracing::info!(generated, "Order generation complete, work queue closed");
    super::emit(&event_tx, Event::GenerationComplete { count: generated });

    Ok(generated)
}
