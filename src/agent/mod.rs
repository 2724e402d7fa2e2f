//! Agent Runtime — provider-agnostic LLM driver with remote tool access,
//! usage telemetry, and a structured-output contract (spec §4.2).

mod anthropic;
mod client;
mod error;
pub mod mock;
mod runtime;
pub mod schema;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use runtime::{AgentError, AgentOutput, AgentRuntime, AgentUsage};
pub use schema::{Field, FieldType, Schema, SchemaError};
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, MessageContent, Role, StopReason, StreamChunk,
    TokenUsage, ToolCall, ToolDefinition,
};

use std::sync::Arc;

use crate::config::LlmConfig;

/// Constructs the LLM client backing the Agent Runtime. A single provider
/// binding is supported today (Anthropic); additional providers register
/// here the same way the teacher's dispatcher does (spec §4.2: "a single
/// free-form string identifies the model and provider").
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicClient::from_config(config)?)),
        other => Err(LlmError::InvalidResponse(format!(
            "Unknown LLM provider: '{other}'. Supported: anthropic"
        ))),
    }
}
