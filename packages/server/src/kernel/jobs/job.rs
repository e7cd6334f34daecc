//! Job and JobLog models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

/// Job lifecycle. Transitions are strictly forward except the operator
/// actions `Failed -> Requested` (retry) and `Pending <-> Requested`
/// (manual edit). `Processing` is only ever entered via an atomic claim
/// and only ever left by the run that claimed it, or by startup
/// recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Requested,
    Processing,
    Completed,
    Failed,
}

/// Which processor handles a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_target_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobTargetType {
    /// Publish to the token-authenticated REST platform.
    RestBlog,
    /// Publish to the OAuth draft-then-publish platform.
    OauthBlog,
    /// Publish through browser automation.
    BrowserBlog,
    /// Generate new post topics instead of publishing.
    TopicDiscovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_log_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobLogLevel {
    #[default]
    Info,
    Warn,
    Error,
}

impl From<composer::LogLevel> for JobLogLevel {
    fn from(level: composer::LogLevel) -> Self {
        match level {
            composer::LogLevel::Info => JobLogLevel::Info,
            composer::LogLevel::Warn => JobLogLevel::Warn,
            composer::LogLevel::Error => JobLogLevel::Error,
        }
    }
}

// ============================================================================
// Models
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub target_type: JobTargetType,
    pub status: JobStatus,
    /// Higher runs first among due jobs.
    pub priority: i32,
    pub subject: String,
    pub description: String,
    /// Job-type-specific payload, owned by the processor and opaque to
    /// the scheduler.
    pub payload: serde_json::Value,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_msg: Option<String>,
    pub error_msg: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct JobLog {
    pub id: Uuid,
    pub job_id: Uuid,
    pub level: JobLogLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for enqueuing a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub target_type: JobTargetType,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// When absent, the job is due immediately.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Operator-editable fields. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPatch {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: Option<JobStatus>,
    pub subject: Option<String>,
    pub description: Option<String>,
}

impl JobPatch {
    pub fn is_empty(&self) -> bool {
        self.scheduled_at.is_none()
            && self.status.is_none()
            && self.subject.is_none()
            && self.description.is_none()
    }
}

/// List filter for the operator surface.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub target_type: Option<JobTargetType>,
    /// Case-insensitive substring match over subject and description.
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
    }

    #[test]
    fn new_job_defaults_apply() {
        let job: NewJob = serde_json::from_str(
            r#"{"target_type":"rest_blog","subject":"Growing basil"}"#,
        )
        .unwrap();
        assert_eq!(job.priority, 0);
        assert!(job.scheduled_at.is_none());
        assert_eq!(job.payload, serde_json::Value::Null);
    }
}
