use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("job '{job_id}' paused at step '{step_name}': {message}")]
    Paused {
        job_id: String,
        step_name: String,
        message: String,
    },

    #[error("job '{job_id}' failed at step '{step_name}': {message}")]
    Failed {
        job_id: String,
        step_name: String,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether the dispatcher may usefully retry this job later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Paused { .. } => true,
            Self::Failed { .. } => false,
            Self::Store(e) => e.is_transient(),
        }
    }
}
