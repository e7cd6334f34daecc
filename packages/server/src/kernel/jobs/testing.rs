//! In-memory job store for tests.
//!
//! Mirrors the Postgres store's semantics, including the conditional
//! claim: all mutations happen under one lock, so a claim is an atomic
//! compare-and-set exactly like the SQL conditional update.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::job::{Job, JobFilter, JobLog, JobLogLevel, JobPatch, JobStatus, NewJob};
use super::store::{DeleteOutcome, JobStore, INTERRUPTED_REASON};

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, Job>,
    logs: Vec<JobLog>,
}

#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every job, for assertions.
    pub fn all_jobs(&self) -> Vec<Job> {
        self.inner.lock().unwrap().jobs.values().cloned().collect()
    }

    pub fn processing_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Processing)
            .count()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(&self, new_job: NewJob) -> Result<Job> {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            target_type: new_job.target_type,
            status: JobStatus::Requested,
            priority: new_job.priority,
            subject: new_job.subject,
            description: new_job.description,
            payload: match new_job.payload {
                serde_json::Value::Null => serde_json::json!({}),
                other => other,
            },
            scheduled_at: new_job.scheduled_at.unwrap_or(now),
            started_at: None,
            completed_at: None,
            result_msg: None,
            error_msg: None,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn recover_interrupted(&self) -> Result<Vec<Uuid>> {
        let mut inner = self.inner.lock().unwrap();
        let mut ids = Vec::new();
        for job in inner.jobs.values_mut() {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::Failed;
                job.error_msg = Some(INTERRUPTED_REASON.to_string());
                job.completed_at = Some(Utc::now());
                ids.push(job.id);
            }
        }
        Ok(ids)
    }

    async fn any_processing(&self) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .jobs
            .values()
            .any(|j| j.status == JobStatus::Processing))
    }

    async fn next_due(&self, now: DateTime<Utc>) -> Result<Option<Job>> {
        let inner = self.inner.lock().unwrap();
        let mut due: Vec<&Job> = inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Requested && j.scheduled_at <= now)
            .collect();
        due.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.scheduled_at.cmp(&b.scheduled_at))
        });
        Ok(due.first().map(|j| (*j).clone()))
    }

    async fn claim(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Requested => {
                job.status = JobStatus::Processing;
                job.started_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete(&self, id: Uuid, result_msg: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(job) = inner.jobs.get_mut(&id) {
            job.status = JobStatus::Completed;
            job.result_msg = Some(result_msg.to_string());
            job.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn fail(&self, id: Uuid, error_msg: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(job) = inner.jobs.get_mut(&id) {
            job.status = JobStatus::Failed;
            job.error_msg = Some(error_msg.to_string());
            job.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn retry(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Failed => {
                job.status = JobStatus::Requested;
                job.result_msg = None;
                job.error_msg = None;
                job.started_at = None;
                job.completed_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn retry_all_failed(&self) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut count = 0;
        for job in inner.jobs.values_mut() {
            if job.status == JobStatus::Failed {
                job.status = JobStatus::Requested;
                job.result_msg = None;
                job.error_msg = None;
                job.started_at = None;
                job.completed_at = None;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete(&self, id: Uuid) -> Result<DeleteOutcome> {
        let mut inner = self.inner.lock().unwrap();
        match inner.jobs.get(&id) {
            None => Ok(DeleteOutcome::NotFound),
            Some(job) if job.status == JobStatus::Processing => Ok(DeleteOutcome::Processing),
            Some(_) => {
                inner.jobs.remove(&id);
                inner.logs.retain(|l| l.job_id != id);
                Ok(DeleteOutcome::Deleted)
            }
        }
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64> {
        let mut count = 0;
        for id in ids {
            if matches!(self.delete(*id).await?, DeleteOutcome::Deleted) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn patch(&self, id: Uuid, patch: JobPatch) -> Result<Option<Job>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(job) = inner.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(scheduled_at) = patch.scheduled_at {
            job.scheduled_at = scheduled_at;
        }
        if let Some(status) = patch.status {
            job.status = status;
        }
        if let Some(subject) = patch.subject {
            job.subject = subject;
        }
        if let Some(description) = patch.description {
            job.description = description;
        }
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.inner.lock().unwrap().jobs.get(&id).cloned())
    }

    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>> {
        let inner = self.inner.lock().unwrap();
        let search = filter.search.as_deref().map(str::to_lowercase);
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| filter.status.map_or(true, |s| j.status == s))
            .filter(|j| filter.target_type.map_or(true, |t| j.target_type == t))
            .filter(|j| {
                search.as_deref().map_or(true, |s| {
                    j.subject.to_lowercase().contains(s)
                        || j.description.to_lowercase().contains(s)
                })
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn append_log(&self, job_id: Uuid, level: JobLogLevel, message: &str) -> Result<()> {
        self.inner.lock().unwrap().logs.push(JobLog {
            id: Uuid::new_v4(),
            job_id,
            level,
            message: message.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn logs(&self, job_id: Uuid, latest_only: bool) -> Result<Vec<JobLog>> {
        let inner = self.inner.lock().unwrap();
        let mut logs: Vec<JobLog> = inner
            .logs
            .iter()
            .filter(|l| l.job_id == job_id)
            .cloned()
            .collect();
        logs.reverse();
        if latest_only {
            logs.truncate(1);
        }
        Ok(logs)
    }
}
