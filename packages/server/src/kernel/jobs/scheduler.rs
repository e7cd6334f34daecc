//! Job scheduler: single-flight, crash-tolerant dispatch.
//!
//! A cooperative polling loop drives the queue. Each tick claims at
//! most one due job and runs it to completion before the next tick can
//! claim another, so at most one job is `Processing` globally. That
//! single slot is the system's backpressure mechanism: it serializes
//! every job type, including ones that share no bottleneck resource.
//! Whether that serialization is worth its simplicity is undecided;
//! the behavior is kept as-is.
//!
//! There is also no timeout on a job's total pipeline duration, so a
//! hung collaborator call holds the slot until the process restarts
//! and recovery marks the job failed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::{Job, JobLogLevel};
use super::registry::ProcessorRegistry;
use super::store::{JobStore, INTERRUPTED_REASON};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How long to wait between ticks.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// Background service that claims and executes due jobs.
pub struct Scheduler {
    store: Arc<dyn JobStore>,
    registry: Arc<ProcessorRegistry>,
    config: SchedulerConfig,
    shutdown: Arc<AtomicBool>,
    /// Serializes the busy check and the claim across the tick loop
    /// and out-of-band dispatch, so two paths cannot both observe an
    /// empty slot and then claim different jobs.
    admission: Mutex<()>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn JobStore>, registry: Arc<ProcessorRegistry>) -> Self {
        Self::with_config(store, registry, SchedulerConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn JobStore>,
        registry: Arc<ProcessorRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            admission: Mutex::new(()),
        }
    }

    /// Handle for requesting graceful shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Force every job left `Processing` by a dead process instance to
    /// `Failed`. The pipeline has no resumption support, so an
    /// interrupted job is a failed job.
    pub async fn recover(&self) -> Result<()> {
        let ids = self.store.recover_interrupted().await?;
        for id in &ids {
            warn!(job_id = %id, "job was processing at shutdown, marked failed");
            self.store
                .append_log(*id, JobLogLevel::Error, INTERRUPTED_REASON)
                .await?;
        }
        if !ids.is_empty() {
            info!(count = ids.len(), "startup recovery finished");
        }
        Ok(())
    }

    /// One scheduler tick: claim and run at most one due job.
    ///
    /// Returns the id of the job that ran, if any. Public so operator
    /// actions and tests can drive the queue without the poll loop.
    pub async fn tick(&self) -> Result<Option<Uuid>> {
        let Some(job) = self.store.next_due(Utc::now()).await? else {
            return Ok(None);
        };

        if !self.admit(job.id).await? {
            return Ok(None);
        }

        self.execute(&job).await;
        Ok(Some(job.id))
    }

    /// Global admission control: one job at a time. The busy check and
    /// the claim happen under the admission lock; the run itself does
    /// not, since once a job is `Processing` the check alone keeps
    /// everyone else out.
    async fn admit(&self, id: Uuid) -> Result<bool> {
        let _slot = self.admission.lock().await;

        if self.store.any_processing().await? {
            debug!("a job is already processing, skipping dispatch");
            return Ok(false);
        }

        if !self.store.claim(id).await? {
            // Another process instance claimed it between select and
            // update.
            debug!(job_id = %id, "lost claim race");
            return Ok(false);
        }
        Ok(true)
    }

    /// Run a claimed job through its processor and persist the outcome.
    ///
    /// This is the single catch boundary for processor failures: the
    /// scheduler itself never falls over because a job did.
    async fn execute(&self, job: &Job) {
        info!(job_id = %job.id, target_type = ?job.target_type, subject = %job.subject, "job starting");

        let Some(processor) = self.registry.get(job.target_type) else {
            let message = format!("no processor registered for {:?}", job.target_type);
            error!(job_id = %job.id, "{message}");
            self.log_and_fail(job.id, &message).await;
            return;
        };

        match processor.process(job).await {
            Ok(result_msg) => {
                info!(job_id = %job.id, "job completed");
                if let Err(e) = self.store.complete(job.id, &result_msg).await {
                    error!(job_id = %job.id, error = %e, "failed to mark job completed");
                }
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "job failed");
                self.log_and_fail(job.id, &e.to_string()).await;
            }
        }
    }

    async fn log_and_fail(&self, id: Uuid, message: &str) {
        if let Err(e) = self.store.append_log(id, JobLogLevel::Error, message).await {
            error!(job_id = %id, error = %e, "failed to append failure log");
        }
        if let Err(e) = self.store.fail(id, message).await {
            error!(job_id = %id, error = %e, "failed to mark job failed");
        }
    }

    /// Operator retry: reset a failed job to `Requested` and dispatch
    /// it immediately instead of waiting for the next tick. The
    /// dispatch happens on a spawned task so callers (HTTP handlers)
    /// are not held for the run's duration. If the immediate claim
    /// loses a race, the tick path picks the job up.
    pub async fn retry_now(self: Arc<Self>, id: Uuid) -> Result<bool> {
        if !self.store.retry(id).await? {
            return Ok(false);
        }
        self.store
            .append_log(id, JobLogLevel::Info, "retry requested by operator")
            .await?;

        let scheduler = Arc::clone(&self);
        tokio::spawn(async move {
            if let Err(e) = scheduler.dispatch_one(id).await {
                error!(job_id = %id, error = %e, "immediate retry dispatch failed");
            }
        });
        Ok(true)
    }

    /// Out-of-band dispatch of one specific job, honoring the global
    /// single-slot rule.
    async fn dispatch_one(&self, id: Uuid) -> Result<()> {
        if !self.admit(id).await? {
            // The slot is busy or the claim was lost; the job waits in
            // Requested for a tick.
            return Ok(());
        }
        if let Some(job) = self.store.get(id).await? {
            self.execute(&job).await;
        }
        Ok(())
    }

    /// Run until shutdown is requested: recovery once, then the tick
    /// loop.
    pub async fn run(&self) -> Result<()> {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "scheduler starting"
        );
        self.recover().await?;

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.tick().await {
                error!(error = %e, "scheduler tick failed");
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        info!("scheduler stopped");
        Ok(())
    }

    /// Convenience wrapper that wires Ctrl+C to shutdown.
    pub async fn run_until_shutdown(&self) -> Result<()> {
        let shutdown = self.shutdown_handle();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
            shutdown.store(true, Ordering::SeqCst);
        });
        self.run().await
    }
}
