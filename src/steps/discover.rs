//! `discover_connected_zones` — depth-gated step that may enqueue follow-on
//! jobs for adjacent zones (spec §4.1 step 8, §9 open question 2).
//!
//! Child jobs receive a fresh budget rather than a share of the parent's
//! remaining budget — the parent's ledger is scoped to the parent job and
//! has no mechanism for ceding tokens to an independent job (see DESIGN.md).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::agent::{AgentRuntime, Field, FieldType, Schema};
use crate::domain::{Checkpoint, Job};
use crate::engine::{StepError, StepHandler};
use crate::prompts::PromptLoader;

use super::research::classify_agent_error;
use super::sink::JobEnqueuer;

#[derive(Serialize)]
struct DiscoverContext<'a> {
    target_entity_name: &'a str,
}

fn response_schema() -> Schema {
    Schema::new(vec![Field::new(
        "zones",
        FieldType::SequenceOf { item: Box::new(FieldType::String) },
        "names of directly connected zones",
    )])
}

/// Guard for [`crate::engine::StepDefinition::with_guard`]: only traverse
/// when the job was submitted with remaining depth.
pub fn guard(_checkpoint: &Checkpoint, job: &Job) -> bool {
    job.depth.is_some_and(|d| d > 0)
}

pub struct DiscoverConnectedZonesStep {
    agent: Arc<AgentRuntime>,
    prompts: Arc<PromptLoader>,
    enqueuer: Arc<dyn JobEnqueuer>,
    max_tokens: u32,
    child_budget_tokens: u64,
}

impl DiscoverConnectedZonesStep {
    pub fn new(agent: Arc<AgentRuntime>, prompts: Arc<PromptLoader>, enqueuer: Arc<dyn JobEnqueuer>, max_tokens: u32, child_budget_tokens: u64) -> Self {
        Self {
            agent,
            prompts,
            enqueuer,
            max_tokens,
            child_budget_tokens,
        }
    }
}

#[async_trait]
impl StepHandler for DiscoverConnectedZonesStep {
    async fn run(&self, checkpoint: &mut Checkpoint, job: &Job) -> Result<u64, StepError> {
        let schema = response_schema();
        let user_prompt = self
            .prompts
            .render(
                "discover_connected_zones",
                &DiscoverContext {
                    target_entity_name: &job.target_entity_name,
                },
            )
            .map_err(|e| StepError::permanent_internal(format!("rendering discover_connected_zones prompt: {e}")))?;

        let output = self
            .agent
            .run("You are a careful geography analyst. Respond with JSON only.", &user_prompt, Some(&schema), self.max_tokens)
            .await
            .map_err(classify_agent_error)?;

        let value: serde_json::Value = serde_json::from_str(&output.content)
            .map_err(|e| StepError::permanent_schema(format!("discover_connected_zones produced invalid JSON: {e}")))?;

        let zones = value.get("zones").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let child_depth = job.depth.unwrap_or(1).saturating_sub(1);

        for (i, zone) in zones.iter().enumerate() {
            let Some(name) = zone.as_str() else { continue };
            let child_job_id = format!("{}-zone-{}-{}", job.job_id, i, name.to_lowercase().replace(' ', "-"));
            let child = Job::new(child_job_id, name, self.child_budget_tokens).with_depth(child_depth);
            if let Err(e) = self.enqueuer.enqueue(child).await {
                tracing::warn!(job_id = %job.job_id, zone = name, error = %e, "DiscoverConnectedZonesStep::run: failed to enqueue child job");
            }
        }

        checkpoint.record_extraction("connected_zones", value);
        Ok(output.usage.total_tokens())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::agent::mock::MockLlmClient;
    use crate::agent::{CompletionResponse, StopReason, TokenUsage};

    fn response(text: &str) -> CompletionResponse {
        CompletionResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 5,
                output_tokens: 5,
                ..Default::default()
            },
        }
    }

    struct RecordingEnqueuer {
        jobs: Mutex<Vec<Job>>,
    }

    #[async_trait]
    impl JobEnqueuer for RecordingEnqueuer {
        async fn enqueue(&self, job: Job) -> Result<(), String> {
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
    }

    #[test]
    fn test_guard_requires_positive_remaining_depth() {
        let cp = Checkpoint::new();
        assert!(!guard(&cp, &Job::new("job-1", "Waterdeep", 100_000)));
        assert!(!guard(&cp, &Job::new("job-1", "Waterdeep", 100_000).with_depth(0)));
        assert!(guard(&cp, &Job::new("job-1", "Waterdeep", 100_000).with_depth(1)));
    }

    #[tokio::test]
    async fn test_discover_enqueues_child_jobs_with_fresh_budget() {
        let llm = Arc::new(MockLlmClient::new(vec![response(r#"{"zones": ["Amn", "Calimshan"]}"#)]));
        let agent = Arc::new(AgentRuntime::new(llm, "anthropic:claude-sonnet-4"));
        let enqueuer = Arc::new(RecordingEnqueuer { jobs: Mutex::new(Vec::new()) });
        let step = DiscoverConnectedZonesStep::new(agent, Arc::new(PromptLoader::embedded_only()), enqueuer.clone(), 500, 50_000);

        let mut cp = Checkpoint::new();
        let job = Job::new("job-1", "Waterdeep", 100_000).with_depth(2);
        step.run(&mut cp, &job).await.unwrap();

        let jobs = enqueuer.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].budget_tokens, 50_000);
        assert_eq!(jobs[0].depth, Some(1));
        assert_eq!(cp.partial_extractions["connected_zones"]["zones"].as_array().unwrap().len(), 2);
    }
}
