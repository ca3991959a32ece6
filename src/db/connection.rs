use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Request {
    Run(Job),
    /// Fold the write-ahead log back into the main file.
    Checkpoint(oneshot::Sender<Result<()>>),
}

/// The thread owning the connection. Dropping it closes the queue, which
/// ends the request loop, then joins the thread.
struct StoreThread {
    queue: Option<mpsc::Sender<Request>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for StoreThread {
    fn drop(&mut self) {
        self.queue.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Vitals store thread panicked");
            }
        }
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open vitals store {}", path.display()))?;
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("Write-ahead logging unavailable for {}: {err}", path.display());
    }
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;
    run_migrations(&mut conn).context("failed to migrate vitals store")?;
    Ok(conn)
}

fn checkpoint(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
        .context("WAL checkpoint failed")
}

fn serve_requests(mut conn: Connection, requests: mpsc::Receiver<Request>) {
    for request in requests {
        match request {
            Request::Run(job) => job(&mut conn),
            Request::Checkpoint(reply) => {
                if reply.send(checkpoint(&conn)).is_err() {
                    debug!("Checkpoint requester went away");
                }
            }
        }
    }
    if let Err(err) = checkpoint(&conn) {
        warn!("Final checkpoint skipped: {err:#}");
    }
    debug!("Vitals store thread finished");
}

/// Handle to the SQLite vitals store. One thread owns the connection and
/// runs submitted closures in order; clones share it.
#[derive(Clone)]
pub struct Database {
    worker: Arc<StoreThread>,
    path: Arc<PathBuf>,
}

impl Database {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let (queue, requests) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let thread_path = path.clone();

        let handle = thread::Builder::new()
            .name("vitalwatch-store".into())
            .spawn(move || match open_connection(&thread_path) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        serve_requests(conn, requests);
                    }
                }
                Err(err) => {
                    if ready_tx.send(Err(err)).is_err() {
                        error!("Vitals store opener vanished during startup");
                    }
                }
            })
            .context("failed to spawn vitals store thread")?;

        let opened = ready_rx
            .recv()
            .context("vitals store thread exited during startup")?;
        if let Err(err) = opened {
            if handle.join().is_err() {
                error!("Vitals store thread panicked during startup");
            }
            return Err(err);
        }

        info!("Vitals store ready at {}", path.display());
        Ok(Self {
            worker: Arc::new(StoreThread {
                queue: Some(queue),
                handle: Some(handle),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn submit(&self, request: Request) -> Result<()> {
        let queue = self
            .worker
            .queue
            .as_ref()
            .ok_or_else(|| anyhow!("vitals store is shut down"))?;
        queue
            .send(request)
            .map_err(|_| anyhow!("vitals store thread is gone"))
    }

    /// Run `task` on the store thread and await its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, answer) = oneshot::channel();
        self.submit(Request::Run(Box::new(move |conn| {
            if reply.send(task(conn)).is_err() {
                debug!("Vitals store caller went away before the result");
            }
        })))?;
        answer
            .await
            .map_err(|_| anyhow!("vitals store thread stopped before answering"))?
    }

    /// Truncate the write-ahead log once every queued write has run.
    pub async fn checkpoint(&self) -> Result<()> {
        let (reply, answer) = oneshot::channel();
        self.submit(Request::Checkpoint(reply))?;
        answer
            .await
            .map_err(|_| anyhow!("vitals store thread stopped before checkpointing"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_and_migrates_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("nested").join("vitals.sqlite3")).unwrap();

        let version: i32 = db
            .execute(|conn| {
                Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
            })
            .await
            .unwrap();

        assert_eq!(version, super::super::migrations::CURRENT_SCHEMA_VERSION);
        assert!(db.path().exists());
    }

    #[tokio::test]
    async fn checkpoint_empties_the_write_ahead_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitals.sqlite3");
        let db = Database::new(path.clone()).unwrap();
        db.execute(|conn| {
            conn.execute(
                "INSERT INTO patients (id, name, created_at, updated_at) VALUES ('p', 'P', 'x', 'x')",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        db.checkpoint().await.unwrap();

        let wal = dir.path().join("vitals.sqlite3-wal");
        let wal_len = std::fs::metadata(&wal).map(|meta| meta.len()).unwrap_or(0);
        assert_eq!(wal_len, 0);
    }

    #[tokio::test]
    async fn reopening_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitals.sqlite3");

        drop(Database::new(path.clone()).unwrap());
        let db = Database::new(path).unwrap();

        let tables: i64 = db
            .execute(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('patients', 'readings', 'emergency_contacts')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(tables, 3);
    }
}
