use rusqlite::{params, Connection};
use tokio::sync::mpsc;
use tracing::warn;

use super::messages::{StoreCommand, StoreResponse};
use super::StoreError;
use crate::domain::Checkpoint;

/// Owns the single `rusqlite::Connection` and processes commands
/// sequentially, matching the actor shape used elsewhere in this crate for
/// serializing access to a resource that is not `Sync`.
pub(super) async fn actor_loop(mut conn: Connection, mut rx: mpsc::Receiver<StoreCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::Load { job_id, reply } => {
                let result = load(&conn, &job_id);
                let _ = reply.send(result);
            }
            StoreCommand::Save {
                job_id,
                checkpoint,
                reply,
            } => {
                let result = save(&mut conn, &job_id, &checkpoint);
                let _ = reply.send(result);
            }
            StoreCommand::Delete { job_id, reply } => {
                let result = delete(&conn, &job_id);
                let _ = reply.send(result);
            }
            StoreCommand::Shutdown => break,
        }
    }
}

fn load(conn: &Connection, job_id: &str) -> StoreResponse<Option<Checkpoint>> {
    let mut stmt = conn.prepare("SELECT document FROM checkpoints WHERE job_id = ?1")?;
    let mut rows = stmt.query(params![job_id])?;
    match rows.next()? {
        Some(row) => {
            let document: String = row.get(0)?;
            let checkpoint: Checkpoint = serde_json::from_str(&document)?;
            Ok(Some(checkpoint))
        }
        None => Ok(None),
    }
}

/// A single-statement `INSERT OR REPLACE` inside SQLite's implicit
/// transaction is all-or-nothing visible to concurrent readers, satisfying
/// the atomic-replacement requirement of spec §4.7.
fn save(conn: &mut Connection, job_id: &str, checkpoint: &Checkpoint) -> StoreResponse<()> {
    let document = serde_json::to_string(checkpoint)?;
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO checkpoints (job_id, document, updated_at) VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
         ON CONFLICT(job_id) DO UPDATE SET document = excluded.document, updated_at = excluded.updated_at",
        params![job_id, document],
    )?;
    tx.commit()?;
    Ok(())
}

fn delete(conn: &Connection, job_id: &str) -> StoreResponse<()> {
    let affected = conn.execute("DELETE FROM checkpoints WHERE job_id = ?1", params![job_id])?;
    if affected == 0 {
        warn!(job_id, "CheckpointStore::delete: no row for job_id");
    }
    Ok(())
}

pub(super) fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS checkpoints (
            job_id TEXT PRIMARY KEY,
            document TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}
