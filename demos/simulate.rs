//! Order pipeline simulation
//!
//! Runs the pipeline with the default configuration (or a JSON config file
//! passed as the first argument), prints progress as it happens and the final
//! statistics at the end. Ctrl+C cancels cleanly.
//!
//! ```bash
//! cargo run --example simulate
//! RUST_LOG=order_pipeline=debug cargo run --example simulate -- config.json
//! ```

use order_pipeline::{Event, Pipeline, PipelineConfig, run_until_signal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    let pipeline = Pipeline::new(config)?;

    let mut events = pipeline.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::OrderGenerated {
                    id,
                    customer_name,
                    item_count,
                    total_amount,
                } => {
                    println!(
                        "Generated order number {} for {}, with items: {} and sum of {:.2}",
                        id, customer_name, item_count, total_amount
                    );
                }
                Event::OrderPickedUp { worker_id, id } => {
                    println!("Worker number {} is processing order number {}", worker_id, id);
                }
                Event::OrderSucceeded { worker_id, id, .. } => {
                    println!(
                        "Worker number {} successfully processed order number {}",
                        worker_id, id
                    );
                }
                Event::OrderAttemptFailed { worker_id, id, .. } => {
                    println!(
                        "Worker number {} failed with order number {}, retrying now...",
                        worker_id, id
                    );
                }
                Event::RetryAttempt {
                    id,
                    attempt,
                    max_retries,
                } => {
                    println!("Retry attempt ({}/{}) for order #{}", attempt, max_retries, id);
                }
                Event::RetrySucceeded { id, .. } => {
                    println!("Retry successful for order #{}", id);
                }
                Event::OrderFailed { id, error } => {
                    println!("FAILURE: Order #{} failed: {}", id, error);
                }
                Event::Cancelled => {
                    println!("Cancelling, finishing orders already generated...");
                }
                Event::Completed { .. } => break,
                Event::GenerationComplete { .. } | Event::DuplicateResult { .. } => {}
            }
        }
    });

    let stats = run_until_signal(&pipeline).await?;
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Event printer task failed");
    }

    println!("\nORDER PROCESSING STATISTICS");
    println!("Total orders: {}", stats.total);
    println!(
        "Successful: {} ({:.2}%)",
        stats.successful,
        stats.success_rate()
    );
    println!("Failed: {} ({:.2}%)", stats.failed, stats.failure_rate());
    if let Some(average) = stats.average_processing_time() {
        println!("Average processing time: {:?}", average);
    }
    println!("Processing complete.");

    Ok(())
}
