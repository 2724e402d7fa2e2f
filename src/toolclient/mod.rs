//! Tool Client — synchronous request/response transport to a remote tool
//! server over a streaming-HTTP RPC channel (spec §4.8).
//!
//! One client is constructed per tool-set endpoint and shared for the
//! pipeline's lifetime (spec §4.2 "clients are shared across all agent runs
//! for the pipeline's lifetime"). The client performs no retries of its
//! own — every failure is reported as transient and retry policy lives with
//! the caller (engine or summarizer).

mod error;
pub mod mock;

pub use error::ToolClientError;
pub use mock::MockToolClient;

use std::time::Duration;

use async_trait::async_trait;

use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Serialize)]
struct CallRequest<'a> {
    tool: &'a str,
    arguments: serde_json::Value,
}

/// A single named tool exposed by a tool server, as reported by
/// `list_tools` (spec §9 "polymorphic capability set").
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub input_schema: serde_json::Value,
}

/// The capability the engine and agent runtime depend on, so tests can
/// substitute [`MockToolClient`] for the real RPC transport.
#[async_trait]
pub trait ToolCaller: Send + Sync {
    async fn call(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
        timeout: Duration,
        read_timeout: Duration,
    ) -> Result<serde_json::Value, ToolClientError>;
}

/// One RPC connection to a tool-set endpoint. Prefixes exposed tool names
/// with `tool_prefix` to avoid collisions across servers sharing an agent
/// run (spec §4.2).
#[derive(Clone)]
pub struct ToolClient {
    http: Client,
    endpoint: String,
    tool_prefix: String,
}

impl ToolClient {
    pub fn new(endpoint: impl Into<String>, tool_prefix: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            tool_prefix: tool_prefix.into(),
        }
    }

    pub fn tool_prefix(&self) -> &str {
        &self.tool_prefix
    }
}

#[async_trait]
impl ToolCaller for ToolClient {
    /// Calls `tool_name` on this client's endpoint and returns the single
    /// JSON result carried by the server's event stream.
    ///
    /// `timeout` bounds the request phase (connection + headers);
    /// `read_timeout` bounds the whole exchange including the event stream.
    async fn call(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
        timeout: Duration,
        read_timeout: Duration,
    ) -> Result<serde_json::Value, ToolClientError> {
        debug!(tool_name, endpoint = %self.endpoint, "ToolClient::call: called");

        let body = CallRequest {
            tool: tool_name,
            arguments,
        };
        let request = self
            .http
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&body);

        let mut source = EventSource::new(request).map_err(|e| ToolClientError::Stream {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        })?;

        let deadline = tokio::time::Instant::now() + read_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(ToolClientError::Timeout {
                    tool_name: tool_name.to_string(),
                });
            }

            let next = tokio::time::timeout(remaining, source.next()).await;
            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => return Err(ToolClientError::NoResult { tool_name: tool_name.to_string() }),
                Err(_) => {
                    return Err(ToolClientError::Timeout {
                        tool_name: tool_name.to_string(),
                    })
                }
            };

            match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) if message.event == "result" => {
                    let value: serde_json::Value =
                        serde_json::from_str(&message.data).map_err(|e| ToolClientError::Stream {
                            tool_name: tool_name.to_string(),
                            message: e.to_string(),
                        })?;
                    return Ok(value);
                }
                Ok(Event::Message(message)) if message.event == "error" => {
                    return Err(ToolClientError::Stream {
                        tool_name: tool_name.to_string(),
                        message: message.data,
                    });
                }
                Ok(Event::Message(_)) => continue,
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    return Err(ToolClientError::NoResult {
                        tool_name: tool_name.to_string(),
                    })
                }
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, _)) => {
                    return Err(ToolClientError::Http {
                        tool_name: tool_name.to_string(),
                        status: status.as_u16(),
                    })
                }
                Err(reqwest_eventsource::Error::Transport(source)) => {
                    warn!(tool_name, error = %source, "ToolClient::call: transport error");
                    return Err(ToolClientError::Transport {
                        tool_name: tool_name.to_string(),
                        message: source.to_string(),
                    });
                }
                Err(e) => {
                    warn!(tool_name, error = %e, "ToolClient::call: event stream error");
                    return Err(ToolClientError::Stream {
                        tool_name: tool_name.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}
