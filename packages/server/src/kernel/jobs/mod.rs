//! Durable job queue: model, store, registry, scheduler.

mod job;
mod registry;
mod scheduler;
mod store;
pub mod testing;

pub use job::{Job, JobFilter, JobLog, JobLogLevel, JobPatch, JobStatus, JobTargetType, NewJob};
pub use registry::{JobProcessor, ProcessorRegistry};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use store::{DeleteOutcome, JobStore, PostgresJobStore, StoreLogSink, INTERRUPTED_REASON};
