use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ToolClientError {
    #[error("tool call to {tool_name} timed out")]
    Timeout { tool_name: String },

    #[error("transport error calling {tool_name}: {message}")]
    Transport { tool_name: String, message: String },

    #[error("tool server returned non-success status {status} for {tool_name}")]
    Http { tool_name: String, status: u16 },

    #[error("malformed event stream from {tool_name}: {message}")]
    Stream { tool_name: String, message: String },

    #[error("tool server returned no result event for {tool_name}")]
    NoResult { tool_name: String },
}

impl ToolClientError {
    /// Every Tool Client failure is transient — spec §4.8: "On non-success
    /// response or transport error, raise a transient error; the caller
    /// decides retry policy." The client itself never retries.
    pub fn is_transient(&self) -> bool {
        true
    }
}
