//! Outbound collaborators the terminal steps hand off to — the message bus
//! and the daemon's job queue are both out of scope (spec §1 "treat as
//! external collaborators"), so these are narrow traits a deployment wires
//! to its own transport. A logging default is provided for standalone runs.

use async_trait::async_trait;
use tracing::info;

use crate::domain::{Job, Package};

#[async_trait]
pub trait PackageSink: Send + Sync {
    async fn publish(&self, package: &Package) -> Result<(), String>;
}

#[async_trait]
pub trait JobEnqueuer: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), String>;
}

/// Writes the package/job to the log instead of a real bus — useful for
/// standalone runs and tests where no broker is configured.
pub struct LoggingSink;

#[async_trait]
impl PackageSink for LoggingSink {
    async fn publish(&self, package: &Package) -> Result<(), String> {
        info!(job_id = %package.job_id, categories = package.extractions.len(), "LoggingSink::publish: package ready");
        Ok(())
    }
}

#[async_trait]
impl JobEnqueuer for LoggingSink {
    async fn enqueue(&self, job: Job) -> Result<(), String> {
        info!(job_id = %job.job_id, target = %job.target_entity_name, depth = ?job.depth, "LoggingSink::enqueue: child job");
        Ok(())
    }
}
