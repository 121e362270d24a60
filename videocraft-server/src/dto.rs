//! Wire-facing response shapes for the §6 external interfaces. Kept
//! separate from [`videocraft_core::types::Job`] so the HTTP surface can
//! evolve (or redact fields) without touching the engine's own model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use videocraft_core::types::{Job, JobStatus};

#[derive(Debug, Serialize)]
pub struct JobSubmissionResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub status_url: String,
}

impl JobSubmissionResponse {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            status_url: format!("/jobs/{}", job.id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
            error: job.error,
            output_url: job.output_id.map(|id| format!("/outputs/{id}.mp4")),
            warnings: job.warnings,
        }
    }
}
