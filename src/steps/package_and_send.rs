//! `package_and_send` — terminal step; assembles and publishes the package
//! (spec §4.1 step 9, §4.10).
//!
//! Assembly itself is `Package::from_checkpoint`; the engine calls it again
//! after the step sequence completes to build the value it returns, so this
//! step's only remaining job is publishing a preview to the outbound sink
//! before the checkpoint is marked completed.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Checkpoint, Job, Package};
use crate::engine::{StepError, StepHandler};

use super::sink::PackageSink;

pub struct PackageAndSendStep {
    sink: Arc<dyn PackageSink>,
}

impl PackageAndSendStep {
    pub fn new(sink: Arc<dyn PackageSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl StepHandler for PackageAndSendStep {
    async fn run(&self, checkpoint: &mut Checkpoint, job: &Job) -> Result<u64, StepError> {
        let package = Package::from_checkpoint(job.job_id.clone(), job.target_entity_name.clone(), checkpoint);
        self.sink
            .publish(&package)
            .await
            .map_err(StepError::permanent_internal)?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::sink::LoggingSink;

    #[tokio::test]
    async fn test_publishes_assembled_package() {
        let step = PackageAndSendStep::new(Arc::new(LoggingSink));
        let mut checkpoint = Checkpoint::new();
        checkpoint.record_extraction("npc_research", serde_json::json!({"confidence": 0.5}));
        let job = Job::new("job-1", "Waterdeep", 100_000);
        let tokens = step.run(&mut checkpoint, &job).await.unwrap();
        assert_eq!(tokens, 0);
    }
}
