//! Checkpoint Store — durable per-job state document (spec §4.7).
//!
//! Backed by SQLite via `rusqlite`. A single connection is owned by a
//! dedicated actor task so that commands are processed strictly
//! sequentially; callers talk to it over a channel, mirroring the
//! actor-per-resource pattern used for other shared mutable state in this
//! crate.

mod actor;
mod error;
mod messages;

pub use error::StoreError;

use std::path::Path;

use rusqlite::Connection;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use self::messages::StoreCommand;
use crate::domain::Checkpoint;

#[derive(Clone)]
pub struct CheckpointStore {
    tx: mpsc::Sender<StoreCommand>,
}

impl CheckpointStore {
    /// Opens (creating if necessary) the SQLite database at `path` and
    /// spawns the actor task that owns the connection.
    pub fn spawn(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        actor::init_schema(&conn)?;
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(actor::actor_loop(conn, rx));
        info!("CheckpointStore::spawn: actor started");
        Ok(Self { tx })
    }

    /// In-memory store, for tests.
    pub fn spawn_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        actor::init_schema(&conn)?;
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(actor::actor_loop(conn, rx));
        Ok(Self { tx })
    }

    pub async fn load(&self, job_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        debug!(job_id, "CheckpointStore::load: called");
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Load {
                job_id: job_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| StoreError::ChannelClosed)?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    pub async fn save(&self, job_id: &str, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        debug!(job_id, step_index = checkpoint.current_step_index, "CheckpointStore::save: called");
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Save {
                job_id: job_id.to_string(),
                checkpoint: Box::new(checkpoint.clone()),
                reply,
            })
            .await
            .map_err(|_| StoreError::ChannelClosed)?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    pub async fn delete(&self, job_id: &str) -> Result<(), StoreError> {
        debug!(job_id, "CheckpointStore::delete: called");
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Delete {
                job_id: job_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| StoreError::ChannelClosed)?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(StoreCommand::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CheckpointStatus;

    #[tokio::test]
    async fn test_load_missing_job_returns_none() {
        let store = CheckpointStore::spawn_in_memory().unwrap();
        assert!(store.load("no-such-job").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let store = CheckpointStore::spawn_in_memory().unwrap();
        let mut cp = Checkpoint::new();
        cp.mark_step_completed("zone_overview_research");
        cp.add_tokens(500);

        store.save("job-1", &cp).await.unwrap();
        let loaded = store.load("job-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_step_index, 1);
        assert_eq!(loaded.tokens_used, 500);
    }

    #[tokio::test]
    async fn test_later_save_observed_over_earlier() {
        let store = CheckpointStore::spawn_in_memory().unwrap();
        let mut cp = Checkpoint::new();
        store.save("job-1", &cp).await.unwrap();

        cp.mark_step_completed("zone_overview_research");
        cp.status = CheckpointStatus::Running;
        store.save("job-1", &cp).await.unwrap();

        let loaded = store.load("job-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_step_index, 1);
    }

    #[tokio::test]
    async fn test_delete_removes_checkpoint() {
        let store = CheckpointStore::spawn_in_memory().unwrap();
        let cp = Checkpoint::new();
        store.save("job-1", &cp).await.unwrap();
        store.delete("job-1").await.unwrap();
        assert!(store.load("job-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_spawn_persists_to_a_real_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("checkpoints.sqlite3");

        let mut cp = Checkpoint::new();
        cp.mark_step_completed("zone_overview_research");
        cp.add_tokens(42);

        {
            let store = CheckpointStore::spawn(&db_path).unwrap();
            store.save("job-1", &cp).await.unwrap();
        }

        let reopened = CheckpointStore::spawn(&db_path).unwrap();
        let loaded = reopened.load("job-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_step_index, 1);
        assert_eq!(loaded.tokens_used, 42);
    }
}
