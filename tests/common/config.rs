//! Test configuration helpers for building pipelines without simulated latency

use std::sync::Arc;
use order_pipeline::{Order, OrderId, Pipeline, PipelineConfig, SimulatedProcessor};

/// Config with every delay disabled
pub fn fast_config(
    order_count: usize,
    worker_count: usize,
    max_retries: u32,
    failure_probability: f64,
) -> PipelineConfig {
    PipelineConfig {
        order_count,
        worker_count,
        max_retries,
        failure_probability,
        ..PipelineConfig::without_delays()
    }
}

/// Deterministic order contents so runs only differ in processing outcomes
pub fn plain_order(id: OrderId) -> Option<Order> {
    Some(Order {
        id,
        customer_name: format!("customer-{}", id),
        items: vec!["Laptop".to_string()],
        total_amount: 1100.0,
    })
}

/// Pipeline with plain orders and the simulated processor for `config`
pub fn simulated_pipeline(config: PipelineConfig) -> Pipeline {
    let processor = SimulatedProcessor::from_config(&config);
    Pipeline::with_components(config, Arc::new(plain_order), Arc::new(processor))
        .expect("test config should be valid")
}
