//! Scheduler behavior tests against the in-memory store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use server_core::kernel::jobs::testing::MemoryJobStore;
use server_core::kernel::jobs::{
    DeleteOutcome, Job, JobFilter, JobLog, JobLogLevel, JobPatch, JobProcessor, JobStatus,
    JobStore, JobTargetType, NewJob, ProcessorRegistry, Scheduler, INTERRUPTED_REASON,
};

/// Processor that tracks concurrency and can fail a set number of
/// times.
struct ProbeProcessor {
    running: AtomicU32,
    max_running: AtomicU32,
    calls: AtomicU32,
    fail_times: u32,
    work: Duration,
}

impl ProbeProcessor {
    fn new() -> Self {
        Self {
            running: AtomicU32::new(0),
            max_running: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            fail_times: 0,
            work: Duration::from_millis(20),
        }
    }

    fn failing_first(mut self, n: u32) -> Self {
        self.fail_times = n;
        self
    }
}

#[async_trait]
impl JobProcessor for ProbeProcessor {
    async fn process(&self, _job: &Job) -> Result<String> {
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);
        tokio::time::sleep(self.work).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_times {
            anyhow::bail!("probe failure {}", call + 1);
        }
        Ok("probe done".to_string())
    }
}

fn new_job(subject: &str) -> NewJob {
    NewJob {
        target_type: JobTargetType::RestBlog,
        subject: subject.to_string(),
        description: String::new(),
        priority: 0,
        payload: serde_json::json!({}),
        scheduled_at: None,
    }
}

fn scheduler_with(
    store: Arc<MemoryJobStore>,
    processor: Arc<ProbeProcessor>,
) -> Arc<Scheduler> {
    let mut registry = ProcessorRegistry::new();
    registry.register(JobTargetType::RestBlog, processor);
    Arc::new(Scheduler::new(store, Arc::new(registry)))
}

async fn wait_for_status(store: &MemoryJobStore, id: uuid::Uuid, status: JobStatus) {
    for _ in 0..100 {
        if store.get(id).await.unwrap().unwrap().status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached {status:?}");
}

#[tokio::test]
async fn concurrent_ticks_never_run_two_jobs_at_once() {
    let store = Arc::new(MemoryJobStore::new());
    let processor = Arc::new(ProbeProcessor::new());
    let scheduler = scheduler_with(store.clone(), processor.clone());

    store.enqueue(new_job("one")).await.unwrap();
    store.enqueue(new_job("two")).await.unwrap();

    let (a, b) = tokio::join!(scheduler.tick(), scheduler.tick());
    a.unwrap();
    b.unwrap();

    assert_eq!(processor.max_running.load(Ordering::SeqCst), 1);
    // Exactly one job ran; the other waits for a later tick.
    let statuses: Vec<JobStatus> = store.all_jobs().iter().map(|j| j.status).collect();
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == JobStatus::Completed)
            .count(),
        1
    );
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == JobStatus::Requested)
            .count(),
        1
    );
}

#[tokio::test]
async fn concurrent_claims_grant_exactly_one_winner() {
    let store = Arc::new(MemoryJobStore::new());
    let job = store.enqueue(new_job("contested")).await.unwrap();

    let (a, b) = tokio::join!(store.claim(job.id), store.claim(job.id));
    let wins = [a.unwrap(), b.unwrap()];
    assert_eq!(wins.iter().filter(|w| **w).count(), 1);
    assert_eq!(store.processing_count(), 1);
}

#[tokio::test]
async fn startup_recovery_fails_interrupted_jobs() {
    let store = Arc::new(MemoryJobStore::new());
    let processor = Arc::new(ProbeProcessor::new());
    let scheduler = scheduler_with(store.clone(), processor);

    // Simulate a process that died mid-run.
    let job = store.enqueue(new_job("interrupted")).await.unwrap();
    assert!(store.claim(job.id).await.unwrap());

    scheduler.recover().await.unwrap();

    let recovered = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(recovered.status, JobStatus::Failed);
    assert_eq!(recovered.error_msg.as_deref(), Some(INTERRUPTED_REASON));

    let logs = store.logs(job.id, false).await.unwrap();
    assert!(logs.iter().any(|l| l.message.contains(INTERRUPTED_REASON)));
}

#[tokio::test]
async fn unregistered_target_type_fails_immediately() {
    let store = Arc::new(MemoryJobStore::new());
    let processor = Arc::new(ProbeProcessor::new());
    let scheduler = scheduler_with(store.clone(), processor);

    let job = store
        .enqueue(NewJob {
            target_type: JobTargetType::BrowserBlog,
            subject: "no handler".to_string(),
            description: String::new(),
            priority: 0,
            payload: serde_json::json!({}),
            scheduled_at: None,
        })
        .await
        .unwrap();

    scheduler.tick().await.unwrap();

    let failed = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error_msg.unwrap().contains("no processor registered"));
}

#[tokio::test]
async fn higher_priority_jobs_run_first() {
    let store = Arc::new(MemoryJobStore::new());
    let processor = Arc::new(ProbeProcessor::new());
    let scheduler = scheduler_with(store.clone(), processor);

    let low = store
        .enqueue(NewJob {
            priority: 0,
            ..new_job("low")
        })
        .await
        .unwrap();
    let high = store
        .enqueue(NewJob {
            priority: 10,
            ..new_job("high")
        })
        .await
        .unwrap();

    let ran = scheduler.tick().await.unwrap();
    assert_eq!(ran, Some(high.id));
    assert_eq!(
        store.get(low.id).await.unwrap().unwrap().status,
        JobStatus::Requested
    );
}

#[tokio::test]
async fn future_jobs_are_not_picked_up() {
    let store = Arc::new(MemoryJobStore::new());
    let processor = Arc::new(ProbeProcessor::new());
    let scheduler = scheduler_with(store.clone(), processor);

    store
        .enqueue(NewJob {
            scheduled_at: Some(Utc::now() + chrono::Duration::hours(1)),
            ..new_job("later")
        })
        .await
        .unwrap();

    assert_eq!(scheduler.tick().await.unwrap(), None);
}

#[tokio::test]
async fn busy_slot_skips_the_tick_entirely() {
    let store = Arc::new(MemoryJobStore::new());
    let processor = Arc::new(ProbeProcessor::new());
    let scheduler = scheduler_with(store.clone(), processor);

    let busy = store.enqueue(new_job("busy")).await.unwrap();
    assert!(store.claim(busy.id).await.unwrap());
    let waiting = store.enqueue(new_job("waiting")).await.unwrap();

    assert_eq!(scheduler.tick().await.unwrap(), None);
    assert_eq!(
        store.get(waiting.id).await.unwrap().unwrap().status,
        JobStatus::Requested
    );
}

#[tokio::test]
async fn operator_retry_reruns_a_failed_job() {
    let store = Arc::new(MemoryJobStore::new());
    let processor = Arc::new(ProbeProcessor::new().failing_first(1));
    let scheduler = scheduler_with(store.clone(), processor.clone());

    let job = store.enqueue(new_job("flaky")).await.unwrap();
    scheduler.tick().await.unwrap();
    wait_for_status(&store, job.id, JobStatus::Failed).await;

    // Retry is rejected for jobs that are not failed.
    let other = store.enqueue(new_job("fine")).await.unwrap();
    assert!(!scheduler.clone().retry_now(other.id).await.unwrap());

    assert!(scheduler.clone().retry_now(job.id).await.unwrap());
    wait_for_status(&store, job.id, JobStatus::Completed).await;

    let retried = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(retried.result_msg.as_deref(), Some("probe done"));
    assert!(retried.error_msg.is_none());
    assert_eq!(processor.calls.load(Ordering::SeqCst), 2);
}

/// Store wrapper that stalls the busy check, widening the window
/// between observing an empty slot and claiming a job.
struct SlowBusyCheckStore {
    inner: Arc<MemoryJobStore>,
    delay: Duration,
}

#[async_trait]
impl JobStore for SlowBusyCheckStore {
    async fn enqueue(&self, new_job: NewJob) -> Result<Job> {
        self.inner.enqueue(new_job).await
    }
    async fn recover_interrupted(&self) -> Result<Vec<Uuid>> {
        self.inner.recover_interrupted().await
    }
    async fn any_processing(&self) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.any_processing().await
    }
    async fn next_due(&self, now: DateTime<Utc>) -> Result<Option<Job>> {
        self.inner.next_due(now).await
    }
    async fn claim(&self, id: Uuid) -> Result<bool> {
        self.inner.claim(id).await
    }
    async fn complete(&self, id: Uuid, result_msg: &str) -> Result<()> {
        self.inner.complete(id, result_msg).await
    }
    async fn fail(&self, id: Uuid, error_msg: &str) -> Result<()> {
        self.inner.fail(id, error_msg).await
    }
    async fn retry(&self, id: Uuid) -> Result<bool> {
        self.inner.retry(id).await
    }
    async fn retry_all_failed(&self) -> Result<u64> {
        self.inner.retry_all_failed().await
    }
    async fn delete(&self, id: Uuid) -> Result<DeleteOutcome> {
        self.inner.delete(id).await
    }
    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64> {
        self.inner.delete_many(ids).await
    }
    async fn patch(&self, id: Uuid, patch: JobPatch) -> Result<Option<Job>> {
        self.inner.patch(id, patch).await
    }
    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        self.inner.get(id).await
    }
    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>> {
        self.inner.list(filter).await
    }
    async fn append_log(&self, job_id: Uuid, level: JobLogLevel, message: &str) -> Result<()> {
        self.inner.append_log(job_id, level, message).await
    }
    async fn logs(&self, job_id: Uuid, latest_only: bool) -> Result<Vec<JobLog>> {
        self.inner.logs(job_id, latest_only).await
    }
}

#[tokio::test]
async fn operator_retry_racing_a_tick_admits_only_one_job() {
    let memory = Arc::new(MemoryJobStore::new());
    let store = Arc::new(SlowBusyCheckStore {
        inner: memory.clone(),
        delay: Duration::from_millis(25),
    });
    let processor = Arc::new(ProbeProcessor::new());
    let mut registry = ProcessorRegistry::new();
    registry.register(JobTargetType::RestBlog, processor.clone());
    let scheduler = Arc::new(Scheduler::new(store, Arc::new(registry)));

    // One failed job for the operator path, one due job for the tick.
    let flaky = memory.enqueue(new_job("flaky")).await.unwrap();
    memory.claim(flaky.id).await.unwrap();
    memory.fail(flaky.id, "boom").await.unwrap();
    memory.enqueue(new_job("due")).await.unwrap();

    let (ticked, retried) =
        tokio::join!(scheduler.tick(), scheduler.clone().retry_now(flaky.id));
    ticked.unwrap();
    assert!(retried.unwrap());

    // Wait for the spawned retry dispatch to settle.
    for _ in 0..100 {
        if memory.processing_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(processor.calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(processor.max_running.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn delete_refuses_processing_jobs() {
    let store = Arc::new(MemoryJobStore::new());
    let job = store.enqueue(new_job("precious")).await.unwrap();
    assert!(store.claim(job.id).await.unwrap());

    assert_eq!(
        store.delete(job.id).await.unwrap(),
        DeleteOutcome::Processing
    );

    store.fail(job.id, "done racing").await.unwrap();
    assert_eq!(store.delete(job.id).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(
        store.delete(job.id).await.unwrap(),
        DeleteOutcome::NotFound
    );
}

#[tokio::test]
async fn bulk_delete_skips_processing_jobs() {
    let store = Arc::new(MemoryJobStore::new());
    let a = store.enqueue(new_job("a")).await.unwrap();
    let b = store.enqueue(new_job("b")).await.unwrap();
    assert!(store.claim(a.id).await.unwrap());

    let deleted = store.delete_many(&[a.id, b.id]).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(store.get(a.id).await.unwrap().is_some());
    assert!(store.get(b.id).await.unwrap().is_none());
}

#[tokio::test]
async fn retry_all_failed_resets_only_failed_jobs() {
    let store = Arc::new(MemoryJobStore::new());
    let failed = store.enqueue(new_job("failed")).await.unwrap();
    store.claim(failed.id).await.unwrap();
    store.fail(failed.id, "boom").await.unwrap();

    let done = store.enqueue(new_job("done")).await.unwrap();
    store.claim(done.id).await.unwrap();
    store.complete(done.id, "ok").await.unwrap();

    assert_eq!(store.retry_all_failed().await.unwrap(), 1);
    assert_eq!(
        store.get(failed.id).await.unwrap().unwrap().status,
        JobStatus::Requested
    );
    assert_eq!(
        store.get(done.id).await.unwrap().unwrap().status,
        JobStatus::Completed
    );
}
