//! In-memory [`LlmClient`] double, mirroring the teacher's
//! `llm::client::MockLlmClient`: cycles through a fixed list of canned
//! responses, recording call count so tests can assert on exchange shape.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StreamChunk};

pub struct MockLlmClient {
    responses: Vec<CompletionResponse>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(index)
            .cloned()
            .ok_or_else(|| LlmError::InvalidResponse("No more mock responses".to_string()))
    }

    async fn stream(&self, request: CompletionRequest, _chunk_tx: mpsc::Sender<StreamChunk>) -> Result<CompletionResponse, LlmError> {
        self.complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Message, StopReason, TokenUsage};

    fn response(text: &str) -> CompletionResponse {
        CompletionResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    #[tokio::test]
    async fn test_mock_cycles_through_canned_responses() {
        let mock = MockLlmClient::new(vec![response("first"), response("second")]);
        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![Message::user("hi")],
            tools: vec![],
            max_tokens: 10,
        };

        let first = mock.complete(request.clone()).await.unwrap();
        let second = mock.complete(request).await.unwrap();
        assert_eq!(first.content.as_deref(), Some("first"));
        assert_eq!(second.content.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_mock_errors_when_exhausted() {
        let mock = MockLlmClient::new(vec![response("only")]);
        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![],
            tools: vec![],
            max_tokens: 10,
        };
        mock.complete(request.clone()).await.unwrap();
        let err = mock.complete(request).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }
}
