//! Job read operations: list and get.

use sqlx::{Row, SqliteConnection};

use super::super::db::{job_from_row, JobStore};
use super::super::types::{Job, JobId, JobStatus};
use crate::error::EngineError;

impl JobStore {
    /// All jobs in insertion order (id ascending).
    pub async fn list(&self) -> Result<Vec<Job>, EngineError> {
        let rows = sqlx::query("SELECT * FROM jobs ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(job_from_row).collect()
    }

    pub async fn get(&self, id: JobId) -> Result<Job, EngineError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => job_from_row(&row),
            None => Err(EngineError::NotFound(id)),
        }
    }

    pub async fn count_with_status(&self, status: JobStatus) -> Result<u64, EngineError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM jobs WHERE status = ?1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n.max(0) as u64)
    }

    /// Jobs currently `downloading` or `uploading`.
    pub async fn active_jobs(&self) -> Result<Vec<Job>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM jobs
            WHERE status IN ('downloading', 'uploading')
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(job_from_row).collect()
    }
}

/// Read one job on an open connection or transaction.
pub(crate) async fn fetch_job(
    conn: &mut SqliteConnection,
    id: JobId,
) -> Result<Option<Job>, EngineError> {
    let row = sqlx::query("SELECT * FROM jobs WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(job_from_row).transpose()
}
