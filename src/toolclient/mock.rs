//! In-memory [`ToolCaller`] double for engine/summarizer tests that must
//! not perform network I/O, mirroring the teacher's `MockLlmClient`
//! call-count/cycling pattern.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ToolCaller, ToolClientError};

pub struct MockToolClient {
    responses: Mutex<Vec<Result<serde_json::Value, ToolClientError>>>,
    call_count: AtomicUsize,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MockToolClient {
    pub fn new(responses: Vec<serde_json::Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            call_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing(tool_name: &str) -> Self {
        let err = ToolClientError::Timeout {
            tool_name: tool_name.to_string(),
        };
        Self {
            responses: Mutex::new(vec![Err(err)]),
            call_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn recorded_calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolCaller for MockToolClient {
    async fn call(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
        _timeout: Duration,
        _read_timeout: Duration,
    ) -> Result<serde_json::Value, ToolClientError> {
        self.calls.lock().unwrap().push((tool_name.to_string(), arguments));
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.lock().unwrap();
        match responses.get(index.min(responses.len().saturating_sub(1))) {
            Some(result) => result.clone(),
            None => Err(ToolClientError::NoResult {
                tool_name: tool_name.to_string(),
            }),
        }
    }
}
