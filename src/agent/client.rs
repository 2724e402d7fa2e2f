//! The provider-facing half of the Agent Runtime: a uniform completion
//! interface implementations bind to a concrete LLM provider (spec §4.2).

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{CompletionRequest, CompletionResponse, LlmError, StreamChunk};

/// A single LLM provider binding. The Agent Runtime holds one of these per
/// pipeline (spec §4.2: "a single free-form string identifies the model and
/// provider; the runtime routes to the appropriate provider library").
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Issues one completion call and returns the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Issues one completion call, forwarding incremental deltas over
    /// `chunk_tx` as they arrive, and returns the same full response
    /// `complete` would have. Not used by the pipeline today (streaming
    /// tool/agent output is a non-goal) but kept as part of the provider
    /// contract since a provider binding naturally exposes both.
    async fn stream(&self, request: CompletionRequest, chunk_tx: mpsc::Sender<StreamChunk>) -> Result<CompletionResponse, LlmError>;
}
