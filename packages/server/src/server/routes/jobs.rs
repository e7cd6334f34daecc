//! Operator REST surface for the job queue.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kernel::jobs::{DeleteOutcome, JobFilter, JobPatch, JobStatus, NewJob};
use crate::server::app::AppState;
use crate::server::error::ApiError;

pub async fn create_job(
    State(state): State<AppState>,
    Json(new_job): Json<NewJob>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let job = state.store.enqueue(new_job).await?;
    Ok((StatusCode::CREATED, Json(serde_json::to_value(job)?)))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(filter): Query<JobFilter>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let jobs = state.store.list(filter).await?;
    Ok(Json(serde_json::to_value(jobs)?))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job = state.store.get(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(serde_json::to_value(job)?))
}

pub async fn patch_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<JobPatch>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::BadRequest("patch has no fields".to_string()));
    }
    // Manual status edits only toggle between pending and requested;
    // the other states belong to the scheduler.
    if let Some(status) = patch.status {
        if !matches!(status, JobStatus::Pending | JobStatus::Requested) {
            return Err(ApiError::BadRequest(
                "status can only be set to pending or requested".to_string(),
            ));
        }
        let current = state.store.get(id).await?.ok_or(ApiError::NotFound)?;
        if !matches!(current.status, JobStatus::Pending | JobStatus::Requested) {
            return Err(ApiError::Conflict(format!(
                "cannot edit the status of a {:?} job",
                current.status
            )));
        }
    }
    let job = state
        .store
        .patch(id, patch)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(serde_json::to_value(job)?))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    match state.store.delete(id).await? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::Processing => Err(ApiError::Conflict(
            "job is currently processing".to_string(),
        )),
        DeleteOutcome::NotFound => Err(ApiError::NotFound),
    }
}

#[derive(Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: u64,
}

/// Bulk delete skips (rather than rejects on) processing jobs.
pub async fn delete_jobs(
    State(state): State<AppState>,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, ApiError> {
    let deleted = state.store.delete_many(&request.ids).await?;
    Ok(Json(BulkDeleteResponse { deleted }))
}

pub async fn retry_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.store.get(id).await?.is_none() {
        return Err(ApiError::NotFound);
    }
    if state.scheduler.retry_now(id).await? {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError::Conflict("job is not in a failed state".to_string()))
    }
}

#[derive(Serialize)]
pub struct BulkRetryResponse {
    pub retried: u64,
}

pub async fn retry_failed_jobs(
    State(state): State<AppState>,
) -> Result<Json<BulkRetryResponse>, ApiError> {
    let retried = state.store.retry_all_failed().await?;
    Ok(Json(BulkRetryResponse { retried }))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub latest_only: bool,
}

pub async fn get_job_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.store.get(id).await?.is_none() {
        return Err(ApiError::NotFound);
    }
    let logs = state.store.logs(id, query.latest_only).await?;
    Ok(Json(serde_json::to_value(logs)?))
}
