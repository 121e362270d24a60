//! Submission, status, cancellation, and listing handlers (§6).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use videocraft_core::store::JobFilter;
use videocraft_core::types::{JobStatus, VideoProject};
use videocraft_core::validation;

use crate::dto::{JobStatusResponse, JobSubmissionResponse};
use crate::errors::{AppError, AppResult};
use crate::AppState;

pub async fn submit(
    State(state): State<AppState>,
    Json(project): Json<VideoProject>,
) -> AppResult<(StatusCode, Json<JobSubmissionResponse>)> {
    validation::validate_config(&project, &state.config.engine.domain_allowlist)?;

    let job = state.store.create(project).await;
    state.pool.submit(job.id)?;

    Ok((StatusCode::ACCEPTED, Json(JobSubmissionResponse::from_job(&job))))
}

pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<JobStatusResponse>> {
    let job = state
        .store
        .get(id)
        .await
        .ok_or_else(|| AppError::not_found("job not found"))?;
    Ok(Json(job.into()))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<JobStatus>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<JobStatusResponse>> {
    let jobs = state
        .store
        .list(Some(JobFilter { status: query.status }))
        .await;
    Json(jobs.into_iter().map(JobStatusResponse::from).collect())
}

/// Request cancellation. Idempotent: cancelling an already-terminal job is a
/// no-op that just returns the current status (§6).
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<JobStatusResponse>> {
    let job = state
        .store
        .get(id)
        .await
        .ok_or_else(|| AppError::not_found("job not found"))?;

    if !job.status.is_terminal() {
        let token = state.cancellations.read().await.get(&id).cloned();
        match token {
            Some(token) => token.cancel(),
            None => {
                // Not yet picked up by a worker: cancel directly from pending.
                let _ = state
                    .store
                    .transition(id, &[JobStatus::Pending], JobStatus::Cancelled)
                    .await;
            }
        }
    }

    let updated = state
        .store
        .get(id)
        .await
        .ok_or_else(|| AppError::not_found("job not found"))?;
    Ok(Json(updated.into()))
}
