//! Shared test helpers for building pipelines with deterministic components.

use crate::config::PipelineConfig;
use crate::error::ProcessError;
use crate::pipeline::Pipeline;
use crate::processor::OrderProcessor;
use crate::source::OrderSource;
use crate::types::{Attempt, Event, Order, OrderId, Outcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Config with no simulated delays
pub(crate) fn fast_config(order_count: usize, worker_count: usize, max_retries: u32) -> PipelineConfig {
    PipelineConfig {
        order_count,
        worker_count,
        max_retries,
        ..PipelineConfig::without_delays()
    }
}

/// Deterministic order for `id`
pub(crate) fn test_order(id: u64) -> Order {
    Order {
        id: OrderId(id),
        customer_name: format!("customer-{}", id),
        items: vec!["Mouse".to_string()],
        total_amount: 15.0,
    }
}

/// Source producing [`test_order`] for every id
pub(crate) fn numbered_source() -> Arc<dyn OrderSource> {
    Arc::new(|id: OrderId| Some(test_order(id.get())))
}

/// Source that runs dry after `limit` orders
pub(crate) fn limited_source(limit: u64) -> Arc<dyn OrderSource> {
    Arc::new(move |id: OrderId| (id.get() <= limit).then(|| test_order(id.get())))
}

/// Processor that fails an order's first `n` attempts, with `n` chosen per order
///
/// Attempts are counted across the worker pool and the retry stage, so
/// `fail_first(3)` fails the first pass and two retries, then succeeds.
pub(crate) struct ScriptedProcessor {
    failures: Box<dyn Fn(OrderId) -> u32 + Send + Sync>,
    delay: Duration,
    calls: Mutex<HashMap<OrderId, Vec<Attempt>>>,
}

impl ScriptedProcessor {
    pub(crate) fn new(failures: impl Fn(OrderId) -> u32 + Send + Sync + 'static) -> Self {
        Self {
            failures: Box::new(failures),
            delay: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Every order fails its first `n` attempts
    pub(crate) fn fail_first(n: u32) -> Self {
        Self::new(move |_| n)
    }

    /// Every attempt of every order fails
    pub(crate) fn always_fail() -> Self {
        Self::fail_first(u32::MAX)
    }

    /// Sleep this long on each attempt
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Attempts seen for `id`, in order
    pub(crate) fn attempts(&self, id: OrderId) -> Vec<Attempt> {
        self.calls
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total attempts seen across all orders
    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().map(Vec::len).sum()
    }
}

#[async_trait::async_trait]
impl OrderProcessor for ScriptedProcessor {
    async fn process(&self, order: &Order, attempt: Attempt) -> Outcome {
        let seen = {
            let mut calls = self.calls.lock().unwrap();
            let entry = calls.entry(order.id).or_default();
            entry.push(attempt);
            entry.len() as u32
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if seen <= (self.failures)(order.id) {
            Outcome::Failure {
                process_time: self.delay,
                error: ProcessError::Transient,
            }
        } else {
            Outcome::Success {
                process_time: self.delay,
            }
        }
    }
}

/// Pipeline wired to [`numbered_source`] and the given processor
pub(crate) fn scripted_pipeline(
    config: PipelineConfig,
    processor: Arc<ScriptedProcessor>,
) -> Pipeline {
    Pipeline::with_components(config, numbered_source(), processor).unwrap()
}

/// Drain every event currently buffered in `rx`
pub(crate) fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
