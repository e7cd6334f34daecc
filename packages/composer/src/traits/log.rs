//! Job log seam.

use async_trait::async_trait;
use uuid::Uuid;

use crate::types::LogLevel;

/// Append-only sink for per-job log lines.
///
/// Appending must never fail a pipeline run: implementations swallow
/// their own storage errors (reporting them via `tracing`) rather than
/// surfacing them to callers.
#[async_trait]
pub trait JobLogSink: Send + Sync {
    async fn append(&self, job_id: Uuid, level: LogLevel, message: &str);
}
