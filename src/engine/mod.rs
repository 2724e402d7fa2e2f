//! Pipeline Engine — drives a job through its fixed, ordered step sequence,
//! persisting a checkpoint after each step and publishing progress events
//! (spec §4.1).
//!
//! The engine is deliberately domain-agnostic: the step sequence is a
//! caller-supplied `Vec<StepDefinition>` (spec §4.1 "parameterize the step
//! list so alternate domains can substitute steps without modifying the
//! engine"). The concrete lore-research sequence lives in `crate::steps`.

mod error;

pub use error::EngineError;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::{Checkpoint, CheckpointStatus, ErrorEntry, ErrorKind, Job, Package};
use crate::status::StatusPublisher;
use crate::store::CheckpointStore;

/// How a step's handler should be treated for diagnostics and prompting
/// purposes (spec §4.1: "research", "extraction", or "transform").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepClassification {
    Research,
    Extraction,
    Transform,
}

/// An error surfaced by a step handler, pre-classified by [`ErrorKind`] so
/// the engine can decide whether to pause (retryable) or fail (terminal)
/// the job (spec §7).
#[derive(Debug, Clone)]
pub struct StepError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StepError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientTimeout, message)
    }

    pub fn transient_transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientTransport, message)
    }

    pub fn permanent_schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermanentSchema, message)
    }

    pub fn permanent_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermanentInternal, message)
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for StepError {}

/// A step's unit of work. Handlers mutate the checkpoint directly via its
/// accumulation methods (`push_content`, `merge_source`, `record_extraction`,
/// ...) and return the number of tokens the step itself consumed — matching
/// spec §4.1's "handler: (checkpoint, job_context) → updated_checkpoint".
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn run(&self, checkpoint: &mut Checkpoint, job: &Job) -> Result<u64, StepError>;
}

/// Skips a step under caller-specified conditions, e.g. depth-gated steps
/// (spec §4.1).
pub type StepGuard = dyn Fn(&Checkpoint, &Job) -> bool + Send + Sync;

pub struct StepDefinition {
    pub name: String,
    pub classification: StepClassification,
    pub timeout: Duration,
    pub guard: Option<Box<StepGuard>>,
    pub handler: Arc<dyn StepHandler>,
}

impl StepDefinition {
    pub fn new(
        name: impl Into<String>,
        classification: StepClassification,
        timeout: Duration,
        handler: Arc<dyn StepHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            classification,
            timeout,
            guard: None,
            handler,
        }
    }

    pub fn with_guard(mut self, guard: impl Fn(&Checkpoint, &Job) -> bool + Send + Sync + 'static) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }
}

/// Drives jobs through a fixed step sequence (spec §4.1).
pub struct Engine {
    steps: Vec<StepDefinition>,
    store: CheckpointStore,
    status: StatusPublisher,
    minimum_headroom_tokens: u64,
    retain_checkpoints_after_completion: bool,
}

impl Engine {
    pub fn new(
        steps: Vec<StepDefinition>,
        store: CheckpointStore,
        status: StatusPublisher,
        minimum_headroom_tokens: u64,
        retain_checkpoints_after_completion: bool,
    ) -> Self {
        Self {
            steps,
            store,
            status,
            minimum_headroom_tokens,
            retain_checkpoints_after_completion,
        }
    }

    /// Drives `job` to completion or to a pause/fail point. Idempotent with
    /// respect to `job.job_id`: re-invocation resumes from the persisted
    /// `current_step_index` (spec §4.1).
    pub async fn run(&self, job: &Job) -> Result<Package, EngineError> {
        debug!(job_id = %job.job_id, "Engine::run: called");

        let mut checkpoint = self.store.load(&job.job_id).await?.unwrap_or_default();
        let total_steps = self.steps.len();

        while checkpoint.current_step_index < total_steps {
            let idx = checkpoint.current_step_index;
            let step = &self.steps[idx];

            if let Some(guard) = &step.guard
                && !guard(&checkpoint, job)
            {
                debug!(job_id = %job.job_id, step = %step.name, "Engine::run: guard skipped step");
                checkpoint.mark_step_completed(step.name.clone());
                self.store.save(&job.job_id, &checkpoint).await?;
                continue;
            }

            self.status.step_started(&job.job_id, &step.name, idx, total_steps);

            let headroom = job.budget_tokens.saturating_sub(checkpoint.tokens_used);
            if headroom < self.minimum_headroom_tokens {
                warn!(job_id = %job.job_id, step = %step.name, headroom, "Engine::run: budget headroom exhausted");
                return self
                    .fail_job(&mut checkpoint, job, &step.name, ErrorKind::PermanentBudget, "insufficient token headroom")
                    .await;
            }

            let started = Instant::now();
            let outcome = tokio::time::timeout(step.timeout, step.handler.run(&mut checkpoint, job)).await;

            match outcome {
                Ok(Ok(tokens_used)) => {
                    checkpoint.add_tokens(tokens_used);
                    checkpoint.mark_step_completed(step.name.clone());
                    self.store.save(&job.job_id, &checkpoint).await?;
                    let duration_ms = started.elapsed().as_millis() as u64;
                    info!(job_id = %job.job_id, step = %step.name, duration_ms, tokens_used, "Engine::run: step completed");
                    self.status.step_completed(&job.job_id, &step.name, duration_ms, tokens_used);
                }
                Ok(Err(step_error)) => {
                    if step_error.kind.is_transient() {
                        return self.pause_job(&mut checkpoint, job, &step.name, step_error).await;
                    }
                    return self
                        .fail_job(&mut checkpoint, job, &step.name, step_error.kind, &step_error.message)
                        .await;
                }
                Err(_elapsed) => {
                    let step_error = StepError::transient_timeout(format!("step '{}' exceeded {:?}", step.name, step.timeout));
                    return self.pause_job(&mut checkpoint, job, &step.name, step_error).await;
                }
            }
        }

        checkpoint.status = CheckpointStatus::Completed;
        self.store.save(&job.job_id, &checkpoint).await?;
        self.status.job_completed(&job.job_id, checkpoint.tokens_used);

        let package = Package::from_checkpoint(job.job_id.clone(), job.target_entity_name.clone(), &checkpoint);

        if !self.retain_checkpoints_after_completion {
            self.store.delete(&job.job_id).await?;
        }

        Ok(package)
    }

    async fn pause_job(
        &self,
        checkpoint: &mut Checkpoint,
        job: &Job,
        step_name: &str,
        step_error: StepError,
    ) -> Result<Package, EngineError> {
        warn!(job_id = %job.job_id, step = step_name, error = %step_error, "Engine::run: step failed transiently, pausing job");
        checkpoint.record_error(ErrorEntry::new(step_name, step_error.kind, step_error.message.clone()));
        checkpoint.status = CheckpointStatus::Paused;
        self.store.save(&job.job_id, checkpoint).await?;
        self.status
            .step_failed_transient(&job.job_id, step_name, step_error.kind, &step_error.message);
        Err(EngineError::Paused {
            job_id: job.job_id.clone(),
            step_name: step_name.to_string(),
            message: step_error.message,
        })
    }

    async fn fail_job(
        &self,
        checkpoint: &mut Checkpoint,
        job: &Job,
        step_name: &str,
        kind: ErrorKind,
        message: &str,
    ) -> Result<Package, EngineError> {
        warn!(job_id = %job.job_id, step = step_name, %message, "Engine::run: step failed permanently, failing job");
        checkpoint.record_error(ErrorEntry::new(step_name, kind, message));
        checkpoint.status = CheckpointStatus::Failed;
        self.store.save(&job.job_id, checkpoint).await?;
        self.status.job_failed(&job.job_id, kind, message);
        Err(EngineError::Failed {
            job_id: job.job_id.clone(),
            step_name: step_name.to_string(),
            message: message.to_string(),
        })
    }
}
