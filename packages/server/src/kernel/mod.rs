//! Server kernel: the job queue and its scheduler.

pub mod jobs;
