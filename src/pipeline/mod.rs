//! Concurrent order pipeline split into focused submodules.
//!
//! The stages are organized as follows:
//! - [`generator`] - Emits orders onto the work queue
//! - [`worker`] - Worker pool draining the work queue
//! - [`retry_stage`] - Serialized bounded retries of failed orders
//! - [`collector`] - Deduplicating result sink and statistics
//! - [`lifecycle`] - Startup, channel wiring and shutdown sequencing

pub mod collector;
mod generator;
mod lifecycle;
mod retry_stage;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use collector::{Collector, Recorded};

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::processor::{OrderProcessor, SimulatedProcessor};
use crate::source::{CatalogOrderSource, OrderSource};
use crate::types::Event;

/// Order-fulfillment pipeline (cloneable - all fields are Arc-wrapped)
///
/// Build one with [`Pipeline::new`] or [`Pipeline::with_components`], subscribe
/// to its events, then call [`Pipeline::run`].
#[derive(Clone)]
pub struct Pipeline {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<PipelineConfig>,
    /// Produces order contents
    pub(crate) source: Arc<dyn OrderSource>,
    /// Processing step shared by workers and the retry stage
    pub(crate) processor: Arc<dyn OrderProcessor>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cooperative cancellation for every stage
    pub(crate) cancel_token: CancellationToken,
}

impl Pipeline {
    /// Create a pipeline with the default random catalogue and simulated processor
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let processor = SimulatedProcessor::from_config(&config);
        Self::with_components(
            config,
            Arc::new(CatalogOrderSource::default()),
            Arc::new(processor),
        )
    }

    /// Create a pipeline with a custom order source and processor
    pub fn with_components(
        config: PipelineConfig,
        source: Arc<dyn OrderSource>,
        processor: Arc<dyn OrderProcessor>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(config.event_capacity);

        Ok(Self {
            config: Arc::new(config),
            source,
            processor,
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Subscribe to pipeline events
    ///
    /// Subscribers only see events sent after they subscribed, so subscribe
    /// before calling [`Pipeline::run`].
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration this pipeline runs with
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Request a clean shutdown
    ///
    /// The generator stops producing, and every order already generated is
    /// finalized (orders not yet processed end as cancelled failures).
    /// Cancellation is permanent for this pipeline instance.
    pub fn cancel(&self) {
        if !self.cancel_token.is_cancelled() {
            tracing::info!("Pipeline cancellation requested");
            self.cancel_token.cancel();
            self.emit(Event::Cancelled);
        }
    }

    /// Token that fires when [`Pipeline::cancel`] is called
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub(crate) fn emit(&self, event: Event) {
        emit(&self.event_tx, event);
    }
}

/// Send an event, ignoring the error raised when nobody is subscribed
pub(crate) fn emit(event_tx: &broadcast::Sender<Event>, event: Event) {
    let _ = event_tx.send(event);
}
