use tokio::sync::oneshot;

use super::StoreError;
use crate::domain::Checkpoint;

pub type StoreResponse<T> = Result<T, StoreError>;

pub enum StoreCommand {
    Load {
        job_id: String,
        reply: oneshot::Sender<StoreResponse<Option<Checkpoint>>>,
    },
    Save {
        job_id: String,
        checkpoint: Box<Checkpoint>,
        reply: oneshot::Sender<StoreResponse<()>>,
    },
    Delete {
        job_id: String,
        reply: oneshot::Sender<StoreResponse<()>>,
    },
    Shutdown,
}
