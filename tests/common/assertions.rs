//! Custom test assertions for pipeline runs

use std::collections::HashMap;
use std::time::Duration;
use order_pipeline::{Event, OrderId, Pipeline, PipelineStats};

/// Events recorded during one run
#[derive(Debug, Default)]
pub struct EventLog {
    /// Every event in arrival order
    pub events: Vec<Event>,
}

impl EventLog {
    /// Retry attempts seen per order
    pub fn retry_attempts(&self) -> HashMap<OrderId, Vec<u32>> {
        let mut attempts: HashMap<OrderId, Vec<u32>> = HashMap::new();
        for event in &self.events {
            if let Event::RetryAttempt { id, attempt, .. } = event {
                attempts.entry(*id).or_default().push(*attempt);
            }
        }
        attempts
    }

    /// Number of events matching `pred`
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

/// Run `pipeline` while recording its events
///
/// Keep runs small enough for the event channel capacity; a lagging
/// subscriber fails the test.
pub async fn run_recording(pipeline: &Pipeline) -> (PipelineStats, EventLog) {
    let mut rx = pipeline.subscribe();
    let recorder = tokio::spawn(async move {
        let mut log = EventLog::default();
        loop {
            match rx.recv().await {
                Ok(Event::Completed { stats }) => {
                    log.events.push(Event::Completed { stats });
                    return log;
                }
                Ok(event) => log.events.push(event),
                Err(e) => panic!("event subscriber failed: {}", e),
            }
        }
    });

    let stats = tokio::time::timeout(Duration::from_secs(30), pipeline.run())
        .await
        .expect("pipeline run timed out")
        .expect("pipeline run failed");
    let log = tokio::time::timeout(Duration::from_secs(5), recorder)
        .await
        .expect("completion event never arrived")
        .expect("recorder task panicked");
    (stats, log)
}

/// Every order finalized exactly once and the counts add up
pub fn assert_accounted(stats: &PipelineStats, expected: usize) {
    assert_eq!(stats.total, expected, "finalized order count");
    assert_eq!(
        stats.successful + stats.failed,
        expected,
        "successful + failed must equal the order count"
    );
    assert_eq!(stats.duplicates_ignored, 0, "no duplicates in a healthy run");
}
