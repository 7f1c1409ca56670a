use std::{
    convert::TryFrom,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

fn to_u64(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("value {value} is negative"))
}

/// Daily-budget store: one row per calendar day, keyed by ISO date.
/// All SQLite access goes through a dedicated worker thread; callers
/// send closures and await the reply, which keeps the connection off
/// the async runtime and trivially single-writer.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("dawblock-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(
                            Err(anyhow::Error::new(err).context("failed to open SQLite database")),
                        );
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Accumulated active seconds for `date`; 0 if the day was never seen.
    pub async fn day_total(&self, date: NaiveDate) -> Result<u64> {
        let key = date.format("%Y-%m-%d").to_string();
        self.execute(move |conn| {
            let total: Option<i64> = conn
                .query_row(
                    "SELECT total_seconds FROM activity_log WHERE activity_date = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .with_context(|| "failed to query day total")?;

            total.map(to_u64).unwrap_or(Ok(0))
        })
        .await
    }

    /// Last-writer-wins upsert of the running total for `date`.
    pub async fn upsert_day_total(&self, date: NaiveDate, total_seconds: u64) -> Result<()> {
        let key = date.format("%Y-%m-%d").to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO activity_log (activity_date, total_seconds)
                 VALUES (?1, ?2)",
                params![key, to_i64(total_seconds)?],
            )
            .with_context(|| "failed to upsert day total")?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp_db(dir: &tempfile::TempDir) -> Database {
        Database::new(dir.path().join("test.sqlite3")).expect("open database")
    }

    #[tokio::test]
    async fn unseen_date_reads_as_zero() {
        let dir = tempdir().unwrap();
        let db = open_temp_db(&dir);
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(db.day_total(date).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let db = open_temp_db(&dir);
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        db.upsert_day_total(date, 1795).await.unwrap();
        assert_eq!(db.day_total(date).await.unwrap(), 1795);
    }

    #[tokio::test]
    async fn upsert_overwrites_with_last_writer_wins() {
        let dir = tempdir().unwrap();
        let db = open_temp_db(&dir);
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        db.upsert_day_total(date, 100).await.unwrap();
        db.upsert_day_total(date, 35).await.unwrap();
        assert_eq!(db.day_total(date).await.unwrap(), 35);
    }

    #[tokio::test]
    async fn days_are_keyed_independently() {
        let dir = tempdir().unwrap();
        let db = open_temp_db(&dir);
        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();

        db.upsert_day_total(monday, 1800).await.unwrap();
        assert_eq!(db.day_total(tuesday).await.unwrap(), 0);
        assert_eq!(db.day_total(monday).await.unwrap(), 1800);
    }

    #[tokio::test]
    async fn reopening_preserves_persisted_totals() {
        let dir = tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        {
            let db = open_temp_db(&dir);
            db.upsert_day_total(date, 600).await.unwrap();
        }

        let db = open_temp_db(&dir);
        assert_eq!(db.day_total(date).await.unwrap(), 600);
    }
}
