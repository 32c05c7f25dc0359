//! Result sink: deduplicates terminal results and aggregates statistics.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::types::{Event, OrderId, PipelineStats, ProcessResult};

/// Upper bound on the id set reserved up front; larger runs grow it as results arrive
const PREALLOCATED_ORDERS: usize = 1024;

/// What happened to a result handed to [`Collector::record`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recorded {
    /// First terminal result for this order; counted
    Finalized,
    /// The order was already finalized; ignored
    Duplicate,
}

/// Aggregates terminal results keyed by order id
///
/// Arrival order does not matter. A second result for an order that is
/// already finalized never changes the counts.
#[derive(Debug)]
pub struct Collector {
    expected: usize,
    finalized: HashSet<OrderId>,
    successful: usize,
    failed: usize,
    duplicates_ignored: usize,
    retry_attempts: u64,
    total_processing_time: Duration,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Collector {
    /// Collector expecting `expected` distinct orders
    pub fn new(expected: usize) -> Self {
        let started_at = Utc::now();
        Self {
            expected,
            finalized: HashSet::with_capacity(expected.min(PREALLOCATED_ORDERS)),
            successful: 0,
            failed: 0,
            duplicates_ignored: 0,
            retry_attempts: 0,
            total_processing_time: Duration::ZERO,
            started_at,
            finished_at: (expected == 0).then_some(started_at),
        }
    }

    /// Count a terminal result unless its order is already finalized
    pub fn record(&mut self, result: &ProcessResult) -> Recorded {
        if !self.finalized.insert(result.order_id) {
            self.duplicates_ignored += 1;
            return Recorded::Duplicate;
        }

        if result.is_success() {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.retry_attempts += u64::from(result.retries);
        self.total_processing_time += result.outcome.process_time();

        if self.finalized.len() == self.expected {
            self.finished_at = Some(Utc::now());
        }
        Recorded::Finalized
    }

    /// Whether every expected order has a terminal result
    pub fn is_complete(&self) -> bool {
        self.finalized.len() >= self.expected
    }

    /// Number of distinct orders finalized so far
    pub fn finalized(&self) -> usize {
        self.finalized.len()
    }

    /// Whether `id` already has a terminal result
    pub fn is_finalized(&self, id: OrderId) -> bool {
        self.finalized.contains(&id)
    }

    /// Snapshot of the aggregate statistics
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            requested: self.expected,
            total: self.finalized.len(),
            successful: self.successful,
            failed: self.failed,
            duplicates_ignored: self.duplicates_ignored,
            retry_attempts: self.retry_attempts,
            total_processing_time: self.total_processing_time,
            cancelled: false,
            started_at: self.started_at,
            finished_at: self.finished_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Everything the collector task needs
pub(crate) struct CollectorContext {
    /// Accumulator
    pub(crate) collector: Collector,
    /// Merged stream of first-pass successes and retry-stage results
    pub(crate) result_rx: mpsc::Receiver<ProcessResult>,
    /// Event channel
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Pipeline cancellation, reported in the completion stats
    pub(crate) cancel_token: CancellationToken,
}

/// Consume results until the stream closes
///
/// Completion is announced as soon as the expected count is reached, but the
/// task keeps receiving until every sender is gone so a late producer never
/// finds the stream closed under it.
pub(crate) async fn run_collector(ctx: CollectorContext) -> Collector {
    let CollectorContext {
        mut collector,
        mut result_rx,
        event_tx,
        cancel_token,
    } = ctx;

    let mut announced = false;
    if collector.is_complete() {
        announce_completion(&collector, &event_tx, &cancel_token);
        announced = true;
    }

    while let Some(result) = result_rx.recv().await {
        match collector.record(&result) {
            Recorded::Finalized => {
                if result.is_success() {
                    tracing::debug!(order_id = %result.order_id, customer = %result.customer_name, process_time = ?result.outcome.process_time(), "Order finalized as success");
                } else if let Some(error) = result.outcome.error() {
                    tracing::debug!(order_id = %result.order_id, customer = %result.customer_name, error = %error, "Order finalized as failure");
                }
            }
            Recorded::Duplicate => {
                tracing::warn!(order_id = %result.order_id, "Ignoring duplicate result for finalized order");
                super::emit(&event_tx, Event::DuplicateResult { id: result.order_id });
            }
        }

        if !announced && collector.is_complete() {
            announce_completion(&collector, &event_tx, &cancel_token);
            announced = true;
        }
    }

    collector
}

fn announce_completion(
    collector: &Collector,
    event_tx: &broadcast::Sender<Event>,
    cancel_token: &CancellationToken,
) {
    let mut stats = collector.stats();
    stats.cancelled = cancel_token.is_cancelled();
    tracing::info!(
        total = stats.total,
        successful = stats.successful,
        failed = stats.failed,
        "All orders finalized"
    );
    super::emit(event_tx, Event::Completed { stats });
}
