//! Agent Runtime — the LLM driver: exposes remote tool servers to the
//! model, accounts token usage, and enforces the structured-output
//! contract (spec §4.2).
//!
//! Session memory is intentionally not preserved across calls: each `run`
//! issues a fresh exchange, so any prior context the caller needs must be
//! passed explicitly in the prompt (spec §4.2 "Session memory").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::client::LlmClient;
use super::schema::{Schema, SchemaError};
use super::types::{CompletionRequest, CompletionResponse, ContentBlock, Message, StopReason, ToolDefinition};
use super::LlmError;
use crate::retry::retry_with_backoff;
use crate::toolclient::{ToolCaller, ToolClientError};

const MAX_TOOL_ITERATIONS: usize = 12;
const MAX_TOOL_CALL_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Tool(#[from] ToolClientError),

    /// Carries the raw (unparsed-or-invalid) response text alongside the
    /// violation, since the caller's repair prompt (spec §4.5) needs to
    /// quote the prior malformed response.
    #[error("schema validation failed: {source}")]
    SchemaValidation {
        raw_response: String,
        #[source]
        source: SchemaError,
    },

    #[error("agent exceeded {0} tool-call iterations without reaching a final answer")]
    TooManyToolIterations(usize),

    #[error("model requested unknown tool '{0}'")]
    UnknownTool(String),
}

impl AgentError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_retryable(),
            Self::Tool(e) => e.is_transient(),
            Self::SchemaValidation { source, .. } => source.is_transient(),
            Self::TooManyToolIterations(_) => false,
            Self::UnknownTool(_) => false,
        }
    }
}

/// Aggregate usage across a (possibly multi-turn) tool-calling exchange.
#[derive(Debug, Clone, Default)]
pub struct AgentUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl AgentUsage {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

pub struct AgentOutput {
    /// Free text, or a validated JSON value when a schema was supplied.
    pub content: String,
    pub usage: AgentUsage,
    pub messages: Vec<Message>,
}

struct RegisteredToolSet {
    client: Arc<dyn ToolCaller>,
    timeout: Duration,
    read_timeout: Duration,
}

/// One pipeline-lifetime runtime: a provider binding plus the tool-set
/// clients declared in configuration (spec §4.2).
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    model: String,
    tool_sets: HashMap<String, RegisteredToolSet>,
    tool_definitions: Vec<ToolDefinition>,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            tool_sets: HashMap::new(),
            tool_definitions: Vec::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Registers a tool set's client and the tools it exposes. Tool names
    /// are prefixed with `prefix` to avoid collisions across servers
    /// (spec §4.2).
    pub fn register_tool_set(
        &mut self,
        prefix: impl Into<String>,
        client: Arc<dyn ToolCaller>,
        timeout: Duration,
        read_timeout: Duration,
        tools: Vec<ToolDefinition>,
    ) {
        let prefix = prefix.into();
        for tool in tools {
            self.tool_definitions.push(ToolDefinition::new(
                format!("{prefix}__{}", tool.name),
                tool.description,
                tool.input_schema,
            ));
        }
        self.tool_sets.insert(
            prefix,
            RegisteredToolSet {
                client,
                timeout,
                read_timeout,
            },
        );
    }

    /// Runs a prompt to completion, handling any tool-use turns the model
    /// requests, and returns the final text (or schema-validated JSON if
    /// `output_schema` is given). Performs exactly one completion attempt
    /// at the top level plus however many tool round-trips the model
    /// drives — repair-on-validation-failure is the caller's concern
    /// (spec §4.1's `extract_all` step owns that retry).
    pub async fn run(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        output_schema: Option<&Schema>,
        max_tokens: u32,
    ) -> Result<AgentOutput, AgentError> {
        debug!(system_prompt_len = system_prompt.len(), user_prompt_len = user_prompt.len(), "AgentRuntime::run: called");

        let mut messages = vec![Message::user(user_prompt.to_string())];
        let mut usage = AgentUsage::default();

        let final_text = loop {
            if messages.len() / 2 > MAX_TOOL_ITERATIONS {
                return Err(AgentError::TooManyToolIterations(MAX_TOOL_ITERATIONS));
            }

            let request = CompletionRequest {
                system_prompt: system_prompt.to_string(),
                messages: messages.clone(),
                tools: self.tool_definitions.clone(),
                max_tokens,
            };

            let response = self.llm.complete(request).await?;
            usage.prompt_tokens += response.usage.input_tokens;
            usage.completion_tokens += response.usage.output_tokens;

            if response.stop_reason != StopReason::ToolUse || response.tool_calls.is_empty() {
                break response.content.unwrap_or_default();
            }

            messages.push(assistant_message_for(&response));
            let tool_results = self.execute_tool_calls(&response).await?;
            messages.push(Message::user_blocks(tool_results));
        };

        if let Some(schema) = output_schema {
            let parsed: Result<serde_json::Value, SchemaError> = serde_json::from_str(&final_text)
                .map_err(|e| SchemaError::Invalid(format!("response was not valid JSON: {e}")));
            let validated = parsed.and_then(|value| schema.validate_strict(&value).map(|_| value));
            if let Err(source) = validated {
                return Err(AgentError::SchemaValidation {
                    raw_response: final_text,
                    source,
                });
            }
        }

        info!(total_tokens = usage.total_tokens(), "AgentRuntime::run: completed");
        Ok(AgentOutput {
            content: final_text,
            usage,
            messages,
        })
    }

    async fn execute_tool_calls(&self, response: &CompletionResponse) -> Result<Vec<ContentBlock>, AgentError> {
        let mut results = Vec::with_capacity(response.tool_calls.len());
        for call in &response.tool_calls {
            let (prefix, bare_name) = call
                .name
                .split_once("__")
                .ok_or_else(|| AgentError::UnknownTool(call.name.clone()))?;
            let tool_set = self
                .tool_sets
                .get(prefix)
                .ok_or_else(|| AgentError::UnknownTool(call.name.clone()))?;

            // The Tool Client performs no retry of its own (spec §4.8); the
            // caller — here, the runtime driving the tool-use loop — owns
            // the retry policy (SPEC_FULL.md §E.2).
            let result = retry_with_backoff(
                MAX_TOOL_CALL_ATTEMPTS,
                ToolClientError::is_transient,
                || tool_set.client.call(bare_name, call.input.clone(), tool_set.timeout, tool_set.read_timeout),
            )
            .await;

            match result {
                Ok(value) => results.push(ContentBlock::tool_result(call.id.clone(), value.to_string(), false)),
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "AgentRuntime::execute_tool_calls: tool call failed after retries");
                    results.push(ContentBlock::tool_result(call.id.clone(), e.to_string(), true));
                }
            }
        }
        Ok(results)
    }
}

fn assistant_message_for(response: &CompletionResponse) -> Message {
    let mut blocks = Vec::new();
    if let Some(text) = &response.content {
        blocks.push(ContentBlock::text(text.clone()));
    }
    for call in &response.tool_calls {
        blocks.push(ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.input.clone(),
        });
    }
    Message::assistant_blocks(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::mock::MockLlmClient;
    use crate::agent::types::{StopReason as SR, TokenUsage, ToolCall};
    use crate::toolclient::MockToolClient;

    fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
            stop_reason: SR::EndTurn,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_run_returns_text_without_tools() {
        let llm = Arc::new(MockLlmClient::new(vec![text_response("hello there")]));
        let runtime = AgentRuntime::new(llm, "anthropic:claude-sonnet-4");
        let output = runtime.run("system", "user", None, 100).await.unwrap();
        assert_eq!(output.content, "hello there");
        assert_eq!(output.usage.total_tokens(), 15);
    }

    #[tokio::test]
    async fn test_run_validates_schema() {
        let schema = Schema::new(vec![super::super::schema::Field::new(
            "name",
            super::super::schema::FieldType::String,
            "name",
        )]);
        let llm = Arc::new(MockLlmClient::new(vec![text_response(r#"{"name": "Waterdeep"}"#)]));
        let runtime = AgentRuntime::new(llm, "anthropic:claude-sonnet-4");
        let output = runtime.run("system", "user", Some(&schema), 100).await.unwrap();
        assert_eq!(output.content, r#"{"name": "Waterdeep"}"#);
    }

    #[tokio::test]
    async fn test_run_schema_violation_is_error() {
        let schema = Schema::new(vec![super::super::schema::Field::new(
            "name",
            super::super::schema::FieldType::String,
            "name",
        )]);
        let llm = Arc::new(MockLlmClient::new(vec![text_response(r#"{"wrong": true}"#)]));
        let runtime = AgentRuntime::new(llm, "anthropic:claude-sonnet-4");
        let err = runtime.run("system", "user", Some(&schema), 100).await.unwrap_err();
        assert!(matches!(err, AgentError::SchemaValidation { .. }));
    }

    #[tokio::test]
    async fn test_run_executes_tool_call_then_returns_final_text() {
        let tool_call_response = CompletionResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call-1".to_string(),
                name: "search__search".to_string(),
                input: serde_json::json!({"query": "Waterdeep"}),
            }],
            stop_reason: SR::ToolUse,
            usage: TokenUsage::default(),
        };
        let llm = Arc::new(MockLlmClient::new(vec![tool_call_response, text_response("done")]));
        let mut runtime = AgentRuntime::new(llm, "anthropic:claude-sonnet-4");
        let mock_tool = Arc::new(MockToolClient::new(vec![serde_json::json!({"results": []})]));
        runtime.register_tool_set(
            "search",
            mock_tool.clone(),
            Duration::from_secs(1),
            Duration::from_secs(1),
            vec![ToolDefinition::new("search", "search the web", serde_json::json!({}))],
        );

        let output = runtime.run("system", "user", None, 100).await.unwrap();
        assert_eq!(output.content, "done");
        assert_eq!(mock_tool.call_count(), 1);
    }
}
