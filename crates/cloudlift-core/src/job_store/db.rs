//! SQLite-backed job store implementation.
//!
//! Handles connection, migrations, and row decoding. Job CRUD lives in `jobs`.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::destinations::Provider;
use crate::error::EngineError;

use super::types::{DestinationResult, Job, JobProgress, JobStatus};

/// Handle to the SQLite-backed job store.
///
/// The database file lives in the state directory: `<state>/jobs.db`.
/// Clones share the pool and the write gate.
#[derive(Clone)]
pub struct JobStore {
    pub(crate) pool: Pool<Sqlite>,
    /// Serializes read-modify-write transactions issued from this process.
    pub(crate) write_gate: Arc<tokio::sync::Mutex<()>>,
}

impl JobStore {
    /// Open (or create) `<state_dir>/jobs.db` and run migrations.
    pub async fn open_in(state_dir: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::open_at(state_dir.as_ref().join("jobs.db")).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;
        let store = JobStore {
            pool,
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), EngineError> {
        // AUTOINCREMENT guarantees ids are never reused after deletes.
        // Nested structures (destinations, progress, results) are JSON columns.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_url TEXT NOT NULL,
                target_filename TEXT NOT NULL,
                destinations_json TEXT NOT NULL,
                status TEXT NOT NULL,
                progress_json TEXT NOT NULL DEFAULT '{}',
                results_json TEXT NOT NULL DEFAULT '{}',
                error_message TEXT,
                worker_handle TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS jobs_status ON jobs (status);")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Close the pool (used to simulate a process restart in tests).
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Transaction for a read-modify-write: `BEGIN IMMEDIATE` takes the write
/// lock before the first read, so a writer in another process makes it wait
/// on `busy_timeout` instead of failing the reader-to-writer upgrade.
pub(crate) async fn begin_write(pool: &Pool<Sqlite>) -> Result<Transaction<'static, Sqlite>, EngineError> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Decode one `jobs` row.
pub(crate) fn job_from_row(row: &SqliteRow) -> Result<Job, EngineError> {
    let destinations_json: String = row.try_get("destinations_json")?;
    let progress_json: String = row.try_get("progress_json")?;
    let results_json: String = row.try_get("results_json")?;
    let status: String = row.try_get("status")?;

    let destinations: Vec<Provider> = serde_json::from_str(&destinations_json)?;
    let progress: JobProgress = serde_json::from_str(&progress_json)?;
    let results: BTreeMap<Provider, DestinationResult> = serde_json::from_str(&results_json)?;

    Ok(Job {
        id: row.try_get("id")?,
        source_url: row.try_get("source_url")?,
        target_filename: row.try_get("target_filename")?,
        destinations,
        status: JobStatus::from_str(&status),
        progress,
        results,
        error_message: row.try_get("error_message")?,
        worker_handle: row.try_get("worker_handle")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Current time as Unix seconds (for DB timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory store for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<JobStore, EngineError> {
    // Single connection so the pool never hands back a different empty database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let store = JobStore {
        pool,
        write_gate: Arc::new(tokio::sync::Mutex::new(())),
    };
    store.migrate().await?;
    Ok(store)
}
