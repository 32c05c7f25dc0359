use super::*;
use crate::pipeline::test_helpers::{
    ScriptedProcessor, drain_events, fast_config, limited_source, numbered_source,
    scripted_pipeline, test_order,
};
use crate::types::{Attempt, Event, Order, OrderId, Outcome, ProcessResult};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
