//! Agent-driven research steps (spec §4.1 steps 1-5): each renders a
//! category-specific system prompt, lets the agent drive search/crawl tool
//! calls to completion, and accumulates the resulting content and sources.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;

use crate::agent::{AgentError, AgentRuntime, LlmError};
use crate::domain::{Checkpoint, Job, Tier};
use crate::engine::{StepError, StepHandler};
use crate::prompts::PromptLoader;

/// Lines of the shape `tier: uri`, emitted by the research prompts to
/// surface citations alongside prose (e.g. `official: https://...`).
static SOURCE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*(official|primary|tertiary)\s*:\s*(\S+)\s*$").unwrap());

#[derive(Serialize)]
struct ResearchContext<'a> {
    target_entity_name: &'a str,
}

pub struct ResearchStep {
    category: &'static str,
    prompt_name: &'static str,
    agent: Arc<AgentRuntime>,
    prompts: Arc<PromptLoader>,
    max_tokens: u32,
}

impl ResearchStep {
    pub fn new(category: &'static str, prompt_name: &'static str, agent: Arc<AgentRuntime>, prompts: Arc<PromptLoader>, max_tokens: u32) -> Self {
        Self {
            category,
            prompt_name,
            agent,
            prompts,
            max_tokens,
        }
    }
}

#[async_trait]
impl StepHandler for ResearchStep {
    async fn run(&self, checkpoint: &mut Checkpoint, job: &Job) -> Result<u64, StepError> {
        let system_prompt = self
            .prompts
            .render(
                self.prompt_name,
                &ResearchContext {
                    target_entity_name: &job.target_entity_name,
                },
            )
            .map_err(|e| StepError::permanent_internal(format!("rendering prompt '{}': {e}", self.prompt_name)))?;

        let output = self
            .agent
            .run(&system_prompt, "Begin your research now and report your findings in prose, citing sources.", None, self.max_tokens)
            .await
            .map_err(classify_agent_error)?;

        checkpoint.push_content(self.category, output.content.clone());
        for caps in SOURCE_LINE_RE.captures_iter(&output.content) {
            let tier = match &caps[1].to_lowercase()[..] {
                "official" => Tier::Official,
                "primary" => Tier::Primary,
                _ => Tier::Tertiary,
            };
            checkpoint.merge_source(self.category, &caps[2], tier);
        }

        Ok(output.usage.total_tokens())
    }
}

/// Maps an [`AgentError`] onto the engine's step-error classification
/// (spec §7's taxonomy).
pub fn classify_agent_error(e: AgentError) -> StepError {
    let kind = match &e {
        AgentError::Llm(LlmError::Timeout(_)) => crate::domain::ErrorKind::TransientTimeout,
        AgentError::Llm(LlmError::RateLimited { .. }) => crate::domain::ErrorKind::TransientRateLimit,
        AgentError::Llm(llm) if llm.is_retryable() => crate::domain::ErrorKind::TransientTransport,
        AgentError::Llm(_) => crate::domain::ErrorKind::PermanentInternal,
        AgentError::Tool(_) => crate::domain::ErrorKind::TransientTransport,
        AgentError::SchemaValidation { .. } => crate::domain::ErrorKind::PermanentSchema,
        AgentError::TooManyToolIterations(_) | AgentError::UnknownTool(_) => crate::domain::ErrorKind::PermanentInternal,
    };
    StepError::new(kind, e.to_string())
}
