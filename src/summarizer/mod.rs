//! Summarizer — map-reduce text compression exposed to the agent as two
//! tool operations (spec §4.3).
//!
//! Bypasses the LLM entirely when content already fits the target size.
//! Otherwise chunks structurally (`crate::chunker`), maps each chunk through
//! an LLM call bounded by a process-wide concurrency semaphore, then reduces
//! by merging until the joined text fits or `max_reduce_passes` is spent.
//! Any unhandled failure degrades to returning the original content
//! unchanged (spec §4.3 "graceful degradation") — this tool must never
//! crash the pipeline.

mod error;

pub use error::SummarizerError;

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::agent::{CompletionRequest, LlmClient, LlmError, Message};
use crate::chunker::{chunk, count_tokens, ChunkStrategy};
use crate::prompts::PromptLoader;
use crate::retry::retry_with_backoff;

const MAX_CHUNK_ATTEMPTS: u32 = 3;
const MIN_CHUNK_OUTPUT_TOKENS: usize = 500;

#[derive(Serialize)]
struct ChunkSummarizeContext<'a> {
    content: &'a str,
    focus_instructions: &'a str,
    max_tokens: usize,
}

#[derive(Serialize)]
struct MergeContext<'a> {
    content: &'a str,
    max_tokens: usize,
}

pub struct Summarizer {
    llm: Arc<dyn LlmClient>,
    model: String,
    prompts: Arc<PromptLoader>,
    semaphore: Arc<tokio::sync::Semaphore>,
    chunk_size: usize,
    overlap: usize,
    max_reduce_passes: usize,
}

impl Summarizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompts: Arc<PromptLoader>,
        max_concurrent_llm_calls: usize,
        chunk_size: usize,
        overlap: usize,
        max_reduce_passes: usize,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            prompts,
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent_llm_calls.max(1))),
            chunk_size,
            overlap,
            max_reduce_passes,
        }
    }

    /// General compression tool operation (spec §4.3).
    pub async fn summarize(&self, content: &str, max_output_tokens: usize, focus_areas: &[String], strategy: ChunkStrategy) -> String {
        let focus_instructions = if focus_areas.is_empty() {
            String::new()
        } else {
            format!("Focus especially on: {}.", focus_areas.join(", "))
        };

        match self.try_summarize(content, max_output_tokens, &focus_instructions, strategy).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Summarizer::summarize: degrading to original content after failure");
                content.to_string()
            }
        }
    }

    /// Extraction-targeted compression tool operation (spec §4.3).
    pub async fn summarize_for_extraction(&self, content: &str, schema_hint: &str, max_output_tokens: usize) -> String {
        let focus_instructions = format!("Preserve detail relevant to this extraction schema:\n{schema_hint}");

        match self
            .try_summarize(content, max_output_tokens, &focus_instructions, ChunkStrategy::Semantic)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Summarizer::summarize_for_extraction: degrading to original content after failure");
                content.to_string()
            }
        }
    }

    async fn try_summarize(
        &self,
        content: &str,
        max_output_tokens: usize,
        focus_instructions: &str,
        strategy: ChunkStrategy,
    ) -> Result<String, SummarizerError> {
        if count_tokens(content) <= max_output_tokens {
            return Ok(content.to_string());
        }

        let chunks = chunk(content, strategy, self.chunk_size, self.overlap);
        if chunks.is_empty() {
            return Ok(String::new());
        }

        let per_chunk_tokens = (max_output_tokens / chunks.len().max(1)).max(MIN_CHUNK_OUTPUT_TOKENS);

        let map_futures = chunks
            .iter()
            .map(|chunk_text| self.map_chunk(chunk_text, per_chunk_tokens, focus_instructions));
        let summaries = futures::future::try_join_all(map_futures).await?;

        let mut joined = summaries.join("\n\n");
        let mut pass = 0;
        while count_tokens(&joined) > max_output_tokens && pass < self.max_reduce_passes {
            joined = self.merge(&joined, max_output_tokens).await?;
            pass += 1;
        }

        Ok(joined)
    }

    async fn map_chunk(&self, chunk_text: &str, max_tokens: usize, focus_instructions: &str) -> Result<String, SummarizerError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("summarizer semaphore is never closed");

        let prompt = self
            .prompts
            .render(
                "chunk_summarize",
                &ChunkSummarizeContext {
                    content: chunk_text,
                    focus_instructions,
                    max_tokens,
                },
            )
            .map_err(|e| SummarizerError::Prompt(e.to_string()))?;

        let result = retry_with_backoff(MAX_CHUNK_ATTEMPTS, LlmError::is_retryable, || self.complete(&prompt, max_tokens as u32)).await;
        drop(permit);
        result
    }

    async fn merge(&self, joined: &str, max_tokens: usize) -> Result<String, SummarizerError> {
        let prompt = self
            .prompts
            .render("merge_summaries", &MergeContext { content: joined, max_tokens })
            .map_err(|e| SummarizerError::Prompt(e.to_string()))?;
        self.complete(&prompt, max_tokens as u32).await
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, SummarizerError> {
        let request = CompletionRequest {
            system_prompt: "You are a precise technical summarizer.".to_string(),
            messages: vec![Message::user(prompt.to_string())],
            tools: Vec::new(),
            max_tokens,
        };
        let response = self.llm.complete(request).await?;
        Ok(response.content.unwrap_or_default())
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::mock::MockLlmClient;
    use crate::agent::{CompletionResponse, StopReason, TokenUsage};

    fn response(text: &str) -> CompletionResponse {
        CompletionResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    fn summarizer(responses: Vec<CompletionResponse>) -> Summarizer {
        let llm = Arc::new(MockLlmClient::new(responses));
        Summarizer::new(llm, "anthropic:claude-sonnet-4", Arc::new(PromptLoader::embedded_only()), 5, 200, 20, 3)
    }

    #[tokio::test]
    async fn test_bypass_rule_returns_unchanged_when_within_target() {
        let s = summarizer(vec![]);
        let out = s.summarize("short text", 1000, &[], ChunkStrategy::Semantic).await;
        assert_eq!(out, "short text");
    }

    #[tokio::test]
    async fn test_summarizes_long_content_via_map_reduce() {
        let long_content = "# Header\n\n".to_string() + &"word ".repeat(2000);
        let chunk_summary = "chunk summary".to_string();
        let s = summarizer(vec![response(&chunk_summary); 10]);
        let out = s.summarize(&long_content, 10, &[], ChunkStrategy::Semantic).await;
        assert!(!out.is_empty());
    }

    #[tokio::test]
    async fn test_degrades_gracefully_when_llm_exhausted() {
        let long_content = "# Header\n\n".to_string() + &"word ".repeat(2000);
        // No mock responses queued: every call fails, forcing degradation.
        let s = summarizer(vec![]);
        let out = s.summarize(&long_content, 10, &[], ChunkStrategy::Semantic).await;
        assert_eq!(out, long_content);
    }

    #[tokio::test]
    async fn test_summarize_for_extraction_uses_schema_hint() {
        let s = summarizer(vec![response("extracted summary"); 10]);
        let out = s.summarize_for_extraction("short", "- name: string", 1000).await;
        assert_eq!(out, "short");
    }
}
