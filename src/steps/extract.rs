//! `extract_all` — single structured-output LLM call over accumulated
//! content, with one schema-repair retry (spec §4.1, §4.5).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::agent::{AgentError, AgentRuntime, Schema};
use crate::chunker::{count_tokens, ChunkStrategy};
use crate::domain::{Checkpoint, ErrorEntry, ErrorKind, Job};
use crate::engine::{StepError, StepHandler};
use crate::prompts::PromptLoader;
use crate::summarizer::Summarizer;

use super::research::classify_agent_error;

#[derive(Serialize)]
struct ExtractContext<'a> {
    target_entity_name: &'a str,
    schema_hint: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct RepairContext<'a> {
    prior_response: &'a str,
    validation_error: &'a str,
    schema_hint: &'a str,
}

pub struct ExtractAllStep {
    agent: Arc<AgentRuntime>,
    summarizer: Arc<Summarizer>,
    prompts: Arc<PromptLoader>,
    schema: Schema,
    max_tokens: u32,
    summarization_target_tokens: usize,
}

impl ExtractAllStep {
    pub fn new(agent: Arc<AgentRuntime>, summarizer: Arc<Summarizer>, prompts: Arc<PromptLoader>, schema: Schema, max_tokens: u32, summarization_target_tokens: usize) -> Self {
        Self {
            agent,
            summarizer,
            prompts,
            schema,
            max_tokens,
            summarization_target_tokens,
        }
    }

    fn joined_content(&self, checkpoint: &Checkpoint) -> String {
        let mut categories: Vec<&String> = checkpoint.accumulated_content.keys().collect();
        categories.sort();
        categories
            .into_iter()
            .flat_map(|category| checkpoint.accumulated_content[category].iter().map(move |block| format!("## {category}\n\n{block}")))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl StepHandler for ExtractAllStep {
    async fn run(&self, checkpoint: &mut Checkpoint, job: &Job) -> Result<u64, StepError> {
        let schema_hint = self.schema.as_hint();
        let mut content = self.joined_content(checkpoint);

        if count_tokens(&content) > self.summarization_target_tokens {
            content = self
                .summarizer
                .summarize_for_extraction(&content, &schema_hint, self.summarization_target_tokens)
                .await;
        }

        let system_prompt = "You are a precise structured-data extraction agent. Respond with JSON only, matching the given schema exactly.";
        let user_prompt = self
            .prompts
            .render(
                "extract_all",
                &ExtractContext {
                    target_entity_name: &job.target_entity_name,
                    schema_hint: &schema_hint,
                    content: &content,
                },
            )
            .map_err(|e| StepError::permanent_internal(format!("rendering extract_all prompt: {e}")))?;

        let first_attempt = self.agent.run(system_prompt, &user_prompt, Some(&self.schema), self.max_tokens).await;

        let output = match first_attempt {
            Ok(output) => output,
            Err(AgentError::SchemaValidation { raw_response, source }) => {
                checkpoint.record_error(ErrorEntry::new("extract_all", ErrorKind::PermanentSchema, format!("repairing after: {source}")));

                let repair_prompt = self
                    .prompts
                    .render(
                        "extraction_repair",
                        &RepairContext {
                            prior_response: &raw_response,
                            validation_error: &source.to_string(),
                            schema_hint: &schema_hint,
                        },
                    )
                    .map_err(|e| StepError::permanent_internal(format!("rendering extraction_repair prompt: {e}")))?;

                self.agent
                    .run(system_prompt, &repair_prompt, Some(&self.schema), self.max_tokens)
                    .await
                    .map_err(classify_agent_error)?
            }
            Err(e) => return Err(classify_agent_error(e)),
        };

        let value: serde_json::Value = serde_json::from_str(&output.content)
            .map_err(|e| StepError::permanent_schema(format!("extract_all produced invalid JSON after repair: {e}")))?;

        if let Some(categories) = value.as_object() {
            for (category, payload) in categories {
                checkpoint.record_extraction(category.clone(), payload.clone());
            }
        }

        Ok(output.usage.total_tokens())
    }
}
