//! Startup and shutdown coordination.
//!
//! Channels close by dropping their last sender, and the coordinator only
//! drops a sender after the stages that use it have been joined. A send into
//! a closed channel therefore cannot happen while the protocol is followed.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};

use super::Pipeline;
use super::collector::{Collector, CollectorContext, run_collector};
use super::generator::{GeneratorContext, run_generator};
use super::retry_stage::{RetryContext, run_retry_stage};
use super::worker::{WorkerContext, run_worker};
use crate::error::{Error, Result};
use crate::types::{Event, PipelineStats};

impl Pipeline {
    /// Run the pipeline to completion and return the final statistics
    ///
    /// The lifecycle is:
    /// 1. Spawn the collector, the retry stage, `worker_count` workers and the generator
    /// 2. Join the generator (the work queue is closed when it returns)
    /// 3. Join every worker; their retry senders were the only ones, so the
    ///    retry stream is closed once the last worker exits
    /// 4. Join the retry stage, which returns only when its resubmissions drained
    /// 5. Drop the coordinator's result sender and join the collector
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceExhausted`] if the order source ran dry (orders
    /// generated before that are still drained first), and
    /// [`Error::Protocol`] if a stage panicked, a channel closed early, or the
    /// number of finalized orders does not match the number generated.
    pub async fn run(&self) -> Result<PipelineStats> {
        let order_count = self.config.order_count;
        let worker_count = self.config.worker_count;
        // Capacity >= order count so the generator never waits on slow workers
        let capacity = order_count.max(1);

        tracing::info!(
            order_count,
            worker_count,
            max_retries = self.config.max_retries,
            failure_probability = self.config.failure_probability,
            "Starting order pipeline"
        );

        let (work_tx, work_rx) = mpsc::channel(capacity);
        let (retry_tx, retry_rx) = mpsc::channel(capacity);
        let (result_tx, result_rx) = mpsc::channel(capacity.saturating_mul(2));
        let queue = Arc::new(Mutex::new(work_rx));

        let collector = tokio::spawn(run_collector(CollectorContext {
            collector: Collector::new(order_count),
            result_rx,
            event_tx: self.event_tx.clone(),
            cancel_token: self.cancel_token.clone(),
        }));

        let retry_stage = tokio::spawn(run_retry_stage(RetryContext {
            retry_rx,
            processor: Arc::clone(&self.processor),
            result_tx: result_tx.clone(),
            max_retries: self.config.max_retries,
            event_tx: self.event_tx.clone(),
            cancel_token: self.cancel_token.clone(),
        }));

        let workers: Vec<_> = (1..=worker_count)
            .map(|worker_id| {
                tokio::spawn(run_worker(WorkerContext {
                    worker_id,
                    queue: Arc::clone(&queue),
                    processor: Arc::clone(&self.processor),
                    retry_tx: retry_tx.clone(),
                    result_tx: result_tx.clone(),
                    event_tx: self.event_tx.clone(),
                    cancel_token: self.cancel_token.clone(),
                }))
            })
            .collect();
        // Workers now hold every retry sender
        drop(retry_tx);

        let generator = tokio::spawn(run_generator(GeneratorContext {
            count: order_count,
            source: Arc::clone(&self.source),
            work_tx,
            pacing: self.config.generation_delay,
            event_tx: self.event_tx.clone(),
            cancel_token: self.cancel_token.clone(),
        }));

        let mut first_error: Option<Error> = None;
        let mut note = |error: Error| {
            tracing::error!(error = %error, "Pipeline stage failed");
            first_error.get_or_insert(error);
        };

        // (a) work queue closes when the generator returns
        let generated = match generator.await.map_err(Error::from).and_then(|r| r) {
            Ok(generated) => Some(generated),
            Err(e) => {
                note(e);
                None
            }
        };

        // (b) retry stream closes when the last worker exits
        for joined in join_all(workers).await {
            if let Err(e) = joined.map_err(Error::from).and_then(|r| r) {
                note(e);
            }
        }
        tracing::debug!("Worker pool drained");

        match retry_stage.await.map_err(Error::from).and_then(|r| r) {
            Ok(report) => {
                tracing::debug!(orders = report.orders, attempts = report.attempts, "Retry stage finished");
            }
            Err(e) => note(e),
        }

        // (c) result stream closes once both producers are done
        drop(result_tx);
        let collector = match collector.await {
            Ok(collector) => Some(collector),
            Err(e) => {
                note(Error::from(e));
                None
            }
        };

        if let Some(error) = first_error {
            return Err(error);
        }
        let (Some(generated), Some(collector)) = (generated, collector) else {
            return Err(Error::Protocol("pipeline stage ended without a report".to_string()));
        };

        if collector.finalized() != generated {
            let message = format!(
                "{} orders generated but {} finalized",
                generated,
                collector.finalized()
            );
            tracing::error!(%message, "Result accounting mismatch");
            return Err(Error::Protocol(message));
        }

        let mut stats = collector.stats();
        stats.cancelled = self.cancel_token.is_cancelled();
        if !collector.is_complete() {
            // Cancelled runs never reach the requested count
            self.emit(Event::Completed {
                stats: stats.clone(),
            });
        }

        tracing::info!(
            total = stats.total,
            successful = stats.successful,
            failed = stats.failed,
            success_rate = stats.success_rate(),
            average_ms = stats.average_processing_time().map(|d| d.as_millis() as u64),
            cancelled = stats.cancelled,
            "Order pipeline finished"
        );
        Ok(stats)
    }
}
