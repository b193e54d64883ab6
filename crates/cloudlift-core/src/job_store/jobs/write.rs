//! Job write operations: create, atomic update, claim, delete.

use sqlx::Row;

use super::super::db::{begin_write, unix_timestamp, JobStore};
use super::super::types::{Job, JobId, JobProgress, JobStatus, NewJob};
use super::read::fetch_job;
use crate::error::EngineError;

impl JobStore {
    /// Insert a new `pending` job. Results and progress start empty.
    pub async fn create(&self, new: &NewJob) -> Result<JobId, EngineError> {
        let now = unix_timestamp();
        let destinations_json = serde_json::to_string(&new.destinations)?;
        let progress_json = serde_json::to_string(&JobProgress::default())?;

        let row_id = sqlx::query(
            r#"
            INSERT INTO jobs (
                source_url, target_filename, destinations_json, status,
                progress_json, results_json, error_message, worker_handle,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, '{}', NULL, NULL, ?6, ?7)
            "#,
        )
        .bind(&new.source_url)
        .bind(&new.target_filename)
        .bind(destinations_json)
        .bind(JobStatus::Pending.as_str())
        .bind(progress_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(row_id)
    }

    /// Read-modify-write one job atomically.
    ///
    /// The mutator works on an in-memory copy. The new row is validated
    /// (immutable fields, status edge, result keys) and written as a whole in
    /// the same transaction; an error from the mutator or from validation
    /// leaves the stored record untouched.
    pub async fn update<F>(&self, id: JobId, mutate: F) -> Result<Job, EngineError>
    where
        F: FnOnce(&mut Job) -> Result<(), EngineError>,
    {
        let _gate = self.write_gate.lock().await;
        let mut tx = begin_write(&self.pool).await?;
        let current = fetch_job(&mut *tx, id)
            .await?
            .ok_or(EngineError::NotFound(id))?;

        let mut next = current.clone();
        mutate(&mut next)?;
        validate_update(&current, &next)?;
        next.updated_at = unix_timestamp();

        write_row(&mut *tx, &next).await?;
        tx.commit().await?;
        Ok(next)
    }

    /// Atomically move the oldest `pending` job to `downloading`, stamping the worker handle.
    pub async fn claim_next_pending(&self, worker_handle: &str) -> Result<Option<Job>, EngineError> {
        let _gate = self.write_gate.lock().await;
        let mut tx = begin_write(&self.pool).await?;
        let row = sqlx::query(
            r#"
            SELECT id FROM jobs
            WHERE status = 'pending'
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let id: JobId = row.try_get("id")?;

        // Guard on status so a concurrent claimer in another process cannot win twice.
        let claimed = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'downloading',
                worker_handle = ?1,
                updated_at = ?2
            WHERE id = ?3 AND status = 'pending'
            "#,
        )
        .bind(worker_handle)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if claimed == 0 {
            tx.commit().await?;
            return Ok(None);
        }

        let job = fetch_job(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(job)
    }

    /// Permanently remove a job row. File cleanup is handled by higher layers.
    pub async fn delete(&self, id: JobId) -> Result<(), EngineError> {
        let _gate = self.write_gate.lock().await;
        let removed = sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if removed == 0 {
            return Err(EngineError::NotFound(id));
        }
        Ok(())
    }

    /// Delete a job only if `check` accepts its current state; returns the removed record.
    ///
    /// Read, check and delete happen in one transaction, so a job cannot
    /// change status between the check and the delete.
    pub async fn remove_if<F>(&self, id: JobId, check: F) -> Result<Job, EngineError>
    where
        F: FnOnce(&Job) -> Result<(), EngineError>,
    {
        let _gate = self.write_gate.lock().await;
        let mut tx = begin_write(&self.pool).await?;
        let job = fetch_job(&mut *tx, id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        check(&job)?;
        sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(job)
    }

    /// Delete every `completed` or `failed` job. Returns the removed ids.
    pub async fn delete_terminal(&self) -> Result<Vec<JobId>, EngineError> {
        let _gate = self.write_gate.lock().await;
        let mut tx = begin_write(&self.pool).await?;
        let rows = sqlx::query(
            r#"
            SELECT id FROM jobs
            WHERE status IN ('completed', 'failed')
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;
        let ids = rows
            .iter()
            .map(|row| row.try_get::<JobId, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;
        sqlx::query("DELETE FROM jobs WHERE status IN ('completed', 'failed')")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(ids)
    }
}

fn validate_update(current: &Job, next: &Job) -> Result<(), EngineError> {
    if next.id != current.id
        || next.source_url != current.source_url
        || next.target_filename != current.target_filename
        || next.destinations != current.destinations
        || next.created_at != current.created_at
    {
        return Err(EngineError::Validation(format!(
            "job {}: id, source url, filename and destinations are immutable",
            current.id
        )));
    }

    if next.status != current.status {
        // Cancelling deletes the record; it is never stored as a status.
        if next.status == JobStatus::Cancelled || !current.status.can_transition_to(next.status) {
            return Err(EngineError::InvalidState {
                id: current.id,
                status: current.status,
                action: JobStatus::transition_action(next.status),
            });
        }
    }

    if let Some(stray) = next
        .results
        .keys()
        .find(|p| !next.destinations.contains(p))
    {
        return Err(EngineError::Validation(format!(
            "job {}: result recorded for unselected destination {}",
            current.id, stray
        )));
    }
    Ok(())
}

async fn write_row(conn: &mut sqlx::SqliteConnection, job: &Job) -> Result<(), EngineError> {
    let progress_json = serde_json::to_string(&job.progress)?;
    let results_json = serde_json::to_string(&job.results)?;
    sqlx::query(
        r#"
        UPDATE jobs
        SET status = ?1,
            progress_json = ?2,
            results_json = ?3,
            error_message = ?4,
            worker_handle = ?5,
            updated_at = ?6
        WHERE id = ?7
        "#,
    )
    .bind(job.status.as_str())
    .bind(progress_json)
    .bind(results_json)
    .bind(&job.error_message)
    .bind(&job.worker_handle)
    .bind(job.updated_at)
    .bind(job.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
