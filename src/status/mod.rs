//! Status Publisher — fire-and-forget job/step lifecycle events (spec §4.9).
//!
//! Publish failures are logged and swallowed: a broken event sink must
//! never fail or stall a running job.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::ErrorKind;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    StepStarted {
        job_id: String,
        step_name: String,
        step_index: usize,
        total_steps: usize,
    },
    StepCompleted {
        job_id: String,
        step_name: String,
        duration_ms: u64,
        tokens_used: u64,
    },
    StepFailedTransient {
        job_id: String,
        step_name: String,
        error_kind: ErrorKind,
        message: String,
    },
    JobFailed {
        job_id: String,
        error_kind: ErrorKind,
        message: String,
    },
    JobCompleted {
        job_id: String,
        tokens_used: u64,
    },
}

/// Publishes [`StatusEvent`]s onto a bounded channel. Cloning shares the
/// same underlying sender, mirroring the Tool Client's one-client-per-
/// lifetime sharing (spec §4.2).
#[derive(Clone)]
pub struct StatusPublisher {
    tx: Option<mpsc::Sender<StatusEvent>>,
}

impl StatusPublisher {
    pub fn new(tx: mpsc::Sender<StatusEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A publisher with nowhere to send events — every publish is a no-op.
    /// Useful for tests and for jobs run without an external status sink.
    pub fn noop() -> Self {
        Self { tx: None }
    }

    pub fn step_started(&self, job_id: &str, step_name: &str, step_index: usize, total_steps: usize) {
        self.publish(StatusEvent::StepStarted {
            job_id: job_id.to_string(),
            step_name: step_name.to_string(),
            step_index,
            total_steps,
        });
    }

    pub fn step_completed(&self, job_id: &str, step_name: &str, duration_ms: u64, tokens_used: u64) {
        self.publish(StatusEvent::StepCompleted {
            job_id: job_id.to_string(),
            step_name: step_name.to_string(),
            duration_ms,
            tokens_used,
        });
    }

    pub fn step_failed_transient(&self, job_id: &str, step_name: &str, error_kind: ErrorKind, message: &str) {
        self.publish(StatusEvent::StepFailedTransient {
            job_id: job_id.to_string(),
            step_name: step_name.to_string(),
            error_kind,
            message: message.to_string(),
        });
    }

    pub fn job_failed(&self, job_id: &str, error_kind: ErrorKind, message: &str) {
        self.publish(StatusEvent::JobFailed {
            job_id: job_id.to_string(),
            error_kind,
            message: message.to_string(),
        });
    }

    pub fn job_completed(&self, job_id: &str, tokens_used: u64) {
        self.publish(StatusEvent::JobCompleted {
            job_id: job_id.to_string(),
            tokens_used,
        });
    }

    fn publish(&self, event: StatusEvent) {
        let Some(tx) = &self.tx else {
            debug!(?event, "StatusPublisher::publish: no-op sink");
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(e) => warn!(error = %e, "StatusPublisher::publish: failed to publish status event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_step_started_is_delivered() {
        let (tx, mut rx) = mpsc::channel(8);
        let publisher = StatusPublisher::new(tx);
        publisher.step_started("job-1", "zone_overview_research", 0, 9);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, StatusEvent::StepStarted { job_id, .. } if job_id == "job-1"));
    }

    #[tokio::test]
    async fn test_job_completed_is_delivered() {
        let (tx, mut rx) = mpsc::channel(8);
        let publisher = StatusPublisher::new(tx);
        publisher.job_completed("job-1", 12_345);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, StatusEvent::JobCompleted { tokens_used: 12_345, .. }));
    }

    #[test]
    fn test_noop_publisher_never_panics() {
        let publisher = StatusPublisher::noop();
        publisher.step_started("job-1", "step", 0, 1);
        publisher.job_failed("job-1", ErrorKind::PermanentInternal, "boom");
    }

    #[tokio::test]
    async fn test_full_channel_does_not_block_or_panic() {
        let (tx, _rx) = mpsc::channel(1);
        let publisher = StatusPublisher::new(tx);
        for _ in 0..5 {
            publisher.step_started("job-1", "step", 0, 1);
        }
    }
}
