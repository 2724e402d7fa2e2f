use thiserror::Error;

use crate::agent::LlmError;

#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("rendering prompt template: {0}")]
    Prompt(String),
}
