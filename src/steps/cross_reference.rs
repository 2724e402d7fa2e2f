//! `cross_reference` — LLM-assisted consistency check over the extractions
//! produced by `extract_all` (spec §4.1).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::agent::{AgentRuntime, Field, FieldType, Schema};
use crate::domain::{Checkpoint, Job};
use crate::engine::{StepError, StepHandler};
use crate::prompts::PromptLoader;

use super::research::classify_agent_error;

#[derive(Serialize)]
struct CrossReferenceContext<'a> {
    target_entity_name: &'a str,
    extractions_json: &'a str,
}

fn response_schema() -> Schema {
    Schema::new(vec![
        Field::new("is_consistent", FieldType::Boolean, "whether referenced entities are consistent across categories"),
        Field::new(
            "conflicts",
            FieldType::SequenceOf {
                item: Box::new(FieldType::Object {
                    schema: Schema::new(vec![
                        Field::new("category", FieldType::String, "category with the conflict"),
                        Field::new("detail", FieldType::String, "description of the conflict"),
                    ]),
                }),
            },
            "conflicting or missing cross-references",
        ),
    ])
}

pub struct CrossReferenceStep {
    agent: Arc<AgentRuntime>,
    prompts: Arc<PromptLoader>,
    max_tokens: u32,
}

impl CrossReferenceStep {
    pub fn new(agent: Arc<AgentRuntime>, prompts: Arc<PromptLoader>, max_tokens: u32) -> Self {
        Self { agent, prompts, max_tokens }
    }
}

#[async_trait]
impl StepHandler for CrossReferenceStep {
    async fn run(&self, checkpoint: &mut Checkpoint, job: &Job) -> Result<u64, StepError> {
        let extractions_json = serde_json::to_string(&checkpoint.partial_extractions)
            .map_err(|e| StepError::permanent_internal(format!("serializing extractions: {e}")))?;

        let schema = response_schema();
        let user_prompt = self
            .prompts
            .render(
                "cross_reference",
                &CrossReferenceContext {
                    target_entity_name: &job.target_entity_name,
                    extractions_json: &extractions_json,
                },
            )
            .map_err(|e| StepError::permanent_internal(format!("rendering cross_reference prompt: {e}")))?;

        let output = self
            .agent
            .run("You are a meticulous consistency checker. Respond with JSON only.", &user_prompt, Some(&schema), self.max_tokens)
            .await
            .map_err(classify_agent_error)?;

        let value: serde_json::Value = serde_json::from_str(&output.content)
            .map_err(|e| StepError::permanent_schema(format!("cross_reference produced invalid JSON: {e}")))?;

        let is_consistent = value.get("is_consistent").and_then(|v| v.as_bool()).unwrap_or(true);
        if !is_consistent {
            adjust_confidence_for_conflicts(checkpoint, &value);
        }

        checkpoint.record_extraction("cross_reference", value);
        Ok(output.usage.total_tokens())
    }
}

/// Lowers a category's stored confidence when the cross-reference pass
/// reports a conflict for it (spec §4.1 "adjusts per-category confidence
/// downward when referenced entities are missing").
fn adjust_confidence_for_conflicts(checkpoint: &mut Checkpoint, cross_reference: &serde_json::Value) {
    let Some(conflicts) = cross_reference.get("conflicts").and_then(|v| v.as_array()) else {
        return;
    };
    for conflict in conflicts {
        let Some(category) = conflict.get("category").and_then(|v| v.as_str()) else {
            continue;
        };
        if let Some(extraction) = checkpoint.partial_extractions.get_mut(category)
            && let Some(confidence) = extraction.get("confidence").and_then(|v| v.as_f64())
        {
            extraction["confidence"] = serde_json::json!((confidence - 0.2).max(0.0));
        }
    }
}
