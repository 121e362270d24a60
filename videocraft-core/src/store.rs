//! Job store (§4.9, C9) — the sole owner of [`Job`] records.
//!
//! Map-level access is guarded by a `RwLock<HashMap<Uuid, Job>>>`; per-job
//! mutation runs under that same write guard, scoped to one entry, which is
//! enough to make `update`/`transition` atomic without a second lock tier.

use crate::error::CoreError;
use crate::types::{Job, JobStatus, VideoProject};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
}

#[derive(Clone)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn create(&self, config: VideoProject) -> Job {
        let job = Job::new(config);
        self.jobs.write().await.insert(job.id, job.clone());
        job
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    pub async fn list(&self, filter: Option<JobFilter>) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        match filter.and_then(|f| f.status) {
            Some(status) => jobs.values().filter(|j| j.status == status).cloned().collect(),
            None => jobs.values().cloned().collect(),
        }
    }

    /// Run `mutator` against the current value of job `id` under the store's
    /// write lock, so the mutator always observes (and replaces) the latest
    /// value atomically.
    pub async fn update(
        &self,
        id: Uuid,
        mutator: impl FnOnce(&mut Job),
    ) -> Result<Job, CoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| CoreError::Internal(format!("job {id} not found")))?;
        let previous_progress = job.progress;
        mutator(job);
        // Progress may only increase (§4.9 invariant).
        if job.progress < previous_progress {
            job.progress = previous_progress;
        }
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    /// Transition job `id` from one of `from` to `to`, enforcing the §3 DAG
    /// and the completion-field invariants (§4.9).
    pub async fn transition(
        &self,
        id: Uuid,
        from: &[JobStatus],
        to: JobStatus,
    ) -> Result<Job, CoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| CoreError::Internal(format!("job {id} not found")))?;

        if !from.contains(&job.status) || !job.status.can_transition_to(to) {
            return Err(CoreError::Internal(format!(
                "invalid transition {:?} -> {:?}",
                job.status, to
            )));
        }

        job.status = to;
        job.updated_at = Utc::now();
        if to.is_terminal() {
            job.completed_at = Some(job.updated_at);
        }
        Ok(job.clone())
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Element, Quality, Scene};

    fn project() -> VideoProject {
        VideoProject {
            scenes: vec![Scene {
                elements: vec![Element::Audio {
                    src: "https://h/a.mp3".to_string(),
                    duration: 0.0,
                    language: "en".to_string(),
                }],
            }],
            elements: vec![Element::Video {
                src: "https://h/bg.mp4".to_string(),
                duration: 10.0,
            }],
            quality: Quality::Standard,
            resolution: None,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = JobStore::new();
        let job = store.create(project()).await;
        let fetched = store.get(job.id).await.unwrap();
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.status, JobStatus::Pending);
        assert_eq!(fetched.progress, 0);
    }

    #[tokio::test]
    async fn get_unknown_id_returns_none() {
        let store = JobStore::new();
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn progress_cannot_regress() {
        let store = JobStore::new();
        let job = store.create(project()).await;
        store.update(job.id, |j| j.progress = 50).await.unwrap();
        let after = store.update(job.id, |j| j.progress = 10).await.unwrap();
        assert_eq!(after.progress, 50);
    }

    #[tokio::test]
    async fn valid_transition_pending_to_processing() {
        let store = JobStore::new();
        let job = store.create(project()).await;
        let updated = store
            .transition(job.id, &[JobStatus::Pending], JobStatus::Processing)
            .await
            .unwrap();
        assert_eq!(updated.status, JobStatus::Processing);
        assert!(updated.completed_at.is_none());
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected() {
        let store = JobStore::new();
        let job = store.create(project()).await;
        let err = store
            .transition(job.id, &[JobStatus::Processing], JobStatus::Completed)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "internal");
    }

    #[tokio::test]
    async fn completion_stamps_completed_at() {
        let store = JobStore::new();
        let job = store.create(project()).await;
        store
            .transition(job.id, &[JobStatus::Pending], JobStatus::Processing)
            .await
            .unwrap();
        let completed = store
            .transition(job.id, &[JobStatus::Processing], JobStatus::Completed)
            .await
            .unwrap();
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let store = JobStore::new();
        let a = store.create(project()).await;
        let _b = store.create(project()).await;
        store
            .transition(a.id, &[JobStatus::Pending], JobStatus::Processing)
            .await
            .unwrap();

        let processing = store
            .list(Some(JobFilter {
                status: Some(JobStatus::Processing),
            }))
            .await;
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, a.id);
    }
}
