//! Job store contract and its PostgreSQL implementation.
//!
//! The store is the sole durable owner of Job and JobLog rows; the
//! scheduler never caches them across ticks. Claiming is an atomic
//! conditional update so multiple process instances can race safely
//! with no extra lock.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::job::{Job, JobFilter, JobLog, JobLogLevel, JobPatch, NewJob};

/// Reason written by startup recovery.
pub const INTERRUPTED_REASON: &str = "interrupted by restart";

/// Outcome of a single-job delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Refused: the job is currently processing.
    Processing,
    NotFound,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job in `Requested`, due at its scheduled time.
    async fn enqueue(&self, new_job: NewJob) -> Result<Job>;

    /// Force every `Processing` job to `Failed` with the fixed
    /// interruption reason. Returns the affected job ids.
    async fn recover_interrupted(&self) -> Result<Vec<Uuid>>;

    /// Whether any job is currently `Processing`.
    async fn any_processing(&self) -> Result<bool>;

    /// The single most eligible `Requested` job due at `now`: highest
    /// priority first, oldest scheduled time within a priority.
    async fn next_due(&self, now: DateTime<Utc>) -> Result<Option<Job>>;

    /// Atomically transition `Requested -> Processing` for this job.
    /// Returns false when the job was no longer `Requested`; losing
    /// that race is a normal outcome, not an error.
    async fn claim(&self, id: Uuid) -> Result<bool>;

    /// Finalize a successful run.
    async fn complete(&self, id: Uuid, result_msg: &str) -> Result<()>;

    /// Finalize a failed run.
    async fn fail(&self, id: Uuid, error_msg: &str) -> Result<()>;

    /// Reset a `Failed` job to `Requested`, clearing prior outcome
    /// fields. Returns false if the job was not `Failed`.
    async fn retry(&self, id: Uuid) -> Result<bool>;

    /// Reset every `Failed` job to `Requested`. Returns how many.
    async fn retry_all_failed(&self) -> Result<u64>;

    async fn delete(&self, id: Uuid) -> Result<DeleteOutcome>;

    /// Delete the given jobs, skipping any that are `Processing`.
    /// Returns how many rows were deleted.
    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64>;

    /// Apply operator edits. Returns the updated job, or `None` if it
    /// does not exist.
    async fn patch(&self, id: Uuid, patch: JobPatch) -> Result<Option<Job>>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>>;

    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>>;

    async fn append_log(&self, job_id: Uuid, level: JobLogLevel, message: &str) -> Result<()>;

    /// Logs for a job, most recent first. `latest_only` returns at most
    /// one line.
    async fn logs(&self, job_id: Uuid, latest_only: bool) -> Result<Vec<JobLog>>;
}

pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn enqueue(&self, new_job: NewJob) -> Result<Job> {
        let payload = match new_job.payload {
            serde_json::Value::Null => serde_json::json!({}),
            other => other,
        };
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (target_type, status, priority, subject, description, payload, scheduled_at)
            VALUES ($1, 'requested', $2, $3, $4, $5, COALESCE($6, now()))
            RETURNING *
            "#,
        )
        .bind(new_job.target_type)
        .bind(new_job.priority)
        .bind(&new_job.subject)
        .bind(&new_job.description)
        .bind(payload)
        .bind(new_job.scheduled_at)
        .fetch_one(&self.pool)
        .await
        .context("failed to enqueue job")?;
        Ok(job)
    }

    async fn recover_interrupted(&self) -> Result<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET status = 'failed', error_msg = $1, completed_at = now(), updated_at = now()
            WHERE status = 'processing'
            RETURNING id
            "#,
        )
        .bind(INTERRUPTED_REASON)
        .fetch_all(&self.pool)
        .await
        .context("failed to recover interrupted jobs")?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn any_processing(&self) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM jobs WHERE status = 'processing')")
                .fetch_one(&self.pool)
                .await
                .context("failed to check for processing jobs")?;
        Ok(exists)
    }

    async fn next_due(&self, now: DateTime<Utc>) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE status = 'requested' AND scheduled_at <= $1
            ORDER BY priority DESC, scheduled_at ASC
            LIMIT 1
            "#,
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("failed to select next due job")?;
        Ok(job)
    }

    async fn claim(&self, id: Uuid) -> Result<bool> {
        // Conditional on the current status: zero rows affected means
        // another runner won the claim.
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'processing', started_at = now(), updated_at = now()
            WHERE id = $1 AND status = 'requested'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("failed to claim job")?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete(&self, id: Uuid, result_msg: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', result_msg = $2, completed_at = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(result_msg)
        .execute(&self.pool)
        .await
        .context("failed to complete job")?;
        Ok(())
    }

    async fn fail(&self, id: Uuid, error_msg: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', error_msg = $2, completed_at = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error_msg)
        .execute(&self.pool)
        .await
        .context("failed to mark job failed")?;
        Ok(())
    }

    async fn retry(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'requested', result_msg = NULL, error_msg = NULL,
                started_at = NULL, completed_at = NULL, updated_at = now()
            WHERE id = $1 AND status = 'failed'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("failed to retry job")?;
        Ok(result.rows_affected() == 1)
    }

    async fn retry_all_failed(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'requested', result_msg = NULL, error_msg = NULL,
                started_at = NULL, completed_at = NULL, updated_at = now()
            WHERE status = 'failed'
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to retry failed jobs")?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<DeleteOutcome> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND status <> 'processing'")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete job")?;
        if result.rows_affected() == 1 {
            return Ok(DeleteOutcome::Deleted);
        }
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM jobs WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if exists {
            Ok(DeleteOutcome::Processing)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM jobs WHERE id = ANY($1) AND status <> 'processing'")
                .bind(ids)
                .execute(&self.pool)
                .await
                .context("failed to delete jobs")?;
        Ok(result.rows_affected())
    }

    async fn patch(&self, id: Uuid, patch: JobPatch) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET scheduled_at = COALESCE($2, scheduled_at),
                status = COALESCE($3, status),
                subject = COALESCE($4, subject),
                description = COALESCE($5, description),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.scheduled_at)
        .bind(patch.status)
        .bind(patch.subject)
        .bind(patch.description)
        .fetch_optional(&self.pool)
        .await
        .context("failed to patch job")?;
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch job")?;
        Ok(job)
    }

    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>> {
        let search = filter.search.map(|s| format!("%{s}%"));
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE ($1::job_status IS NULL OR status = $1)
              AND ($2::job_target_type IS NULL OR target_type = $2)
              AND ($3::text IS NULL OR subject ILIKE $3 OR description ILIKE $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.status)
        .bind(filter.target_type)
        .bind(search)
        .fetch_all(&self.pool)
        .await
        .context("failed to list jobs")?;
        Ok(jobs)
    }

    async fn append_log(&self, job_id: Uuid, level: JobLogLevel, message: &str) -> Result<()> {
        sqlx::query("INSERT INTO job_logs (job_id, level, message) VALUES ($1, $2, $3)")
            .bind(job_id)
            .bind(level)
            .bind(message)
            .execute(&self.pool)
            .await
            .context("failed to append job log")?;
        Ok(())
    }

    async fn logs(&self, job_id: Uuid, latest_only: bool) -> Result<Vec<JobLog>> {
        let limit: i64 = if latest_only { 1 } else { i64::MAX };
        let logs = sqlx::query_as::<_, JobLog>(
            r#"
            SELECT * FROM job_logs
            WHERE job_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(job_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch job logs")?;
        Ok(logs)
    }
}

/// Bridge from the pipeline's log seam into the job store. Storage
/// errors are reported via tracing and swallowed; a log write must
/// never fail a pipeline run.
pub struct StoreLogSink {
    store: std::sync::Arc<dyn JobStore>,
}

impl StoreLogSink {
    pub fn new(store: std::sync::Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl composer::traits::JobLogSink for StoreLogSink {
    async fn append(&self, job_id: Uuid, level: composer::LogLevel, message: &str) {
        if let Err(e) = self.store.append_log(job_id, level.into(), message).await {
            tracing::error!(job_id = %job_id, error = %e, "failed to append job log");
        }
    }
}
