mod health;
mod jobs;

pub use health::health_handler;
pub use jobs::{
    create_job, delete_job, delete_jobs, get_job, get_job_logs, list_jobs, patch_job, retry_failed_jobs,
    retry_job,
};
