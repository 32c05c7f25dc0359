//! # order-pipeline
//!
//! Concurrent order-fulfillment pipeline with bounded retries.
//!
//! ## Design
//!
//! A generator emits orders onto a bounded work queue, a pool of workers
//! processes them, failed orders go through a single retry stage that enforces
//! a maximum number of attempts, and a collector aggregates exactly one
//! terminal result per order into [`PipelineStats`].
//!
//! - **Exactly-once accounting** - every generated order is finalized once;
//!   duplicate results are ignored
//! - **Join-barrier shutdown** - channels close only after the stages feeding
//!   them have been joined, never after a guessed delay
//! - **Event-driven** - consumers subscribe to progress events, no polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use order_pipeline::{Event, Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::new(PipelineConfig::default())?;
//!
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let Event::RetryAttempt { id, attempt, max_retries } = event {
//!                 println!("Retry attempt ({}/{}) for order #{}", attempt, max_retries, id);
//!             }
//!         }
//!     });
//!
//!     let stats = pipeline.run().await?;
//!     println!("{} of {} orders succeeded", stats.successful, stats.total);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Generator, worker pool, retry stage, collector and shutdown coordination
pub mod pipeline;
/// Order processing seam and the simulated processor
pub mod processor;
/// Bounded retry bookkeeping
pub mod retry;
/// Order content generation
pub mod source;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{DelayRange, MAX_ORDER_COUNT, PipelineConfig};
pub use error::{Error, ProcessError, Result};
pub use pipeline::{Collector, Pipeline, Recorded};
pub use processor::{OrderProcessor, SimulatedProcessor};
pub use retry::{IsRetryable, RetryDecision, RetryLedger};
pub use source::{CatalogOrderSource, OrderSource, Product};
pub use types::{Attempt, Event, Order, OrderId, Outcome, PipelineStats, ProcessResult};

/// Run the pipeline, cancelling it cleanly on a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// After a signal the pipeline keeps running until every order already
/// generated is finalized, then returns its statistics.
///
/// # Example
///
/// ```no_run
/// use order_pipeline::{Pipeline, PipelineConfig, run_until_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pipeline = Pipeline::new(PipelineConfig::default())?;
///     let stats = run_until_signal(&pipeline).await?;
///     println!("cancelled: {}", stats.cancelled);
///     Ok(())
/// }
/// ```
pub async fn run_until_signal(pipeline: &Pipeline) -> Result<PipelineStats> {
    let run = pipeline.run();
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => return result,
        _ = wait_for_signal() => {
            pipeline.cancel();
        }
    }

    run.await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            match signal(SignalKind::interrupt()) {
                Ok(mut sigint) => {
                    sigint.recv().await;
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
                Err(_) => ctrl_c_or_never().await,
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM signal");
                }
                Err(_) => ctrl_c_or_never().await,
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c_or_never().await
}

/// Wait for Ctrl+C; if it cannot be watched, never resolve so the run is not cancelled
async fn ctrl_c_or_never() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
