use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("checkpoint not found for job")]
    NotFound,

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("checkpoint (de)serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("checkpoint store actor channel closed")]
    ChannelClosed,
}

impl StoreError {
    /// Checkpoint store write failures are transient (spec §7): the caller
    /// retries the save with backoff, and the engine must not advance on an
    /// unsaved step.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}
