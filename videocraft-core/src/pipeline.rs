//! Pipeline driver (§4.11, C11) — per-job glue: probe, transcribe, generate
//! subtitle events, write the subtitle file, build the transcoder command,
//! run it, publish the result. Each step advances the job's progress
//! milestone on success; any error fails the job with a sanitized message
//! rather than letting a panic take the worker down with it.

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::store::JobStore;
use crate::subtitles;
use crate::transcoder::command;
use crate::transcoder::runner;
use crate::transcription::{self, DaemonSupervisor};
use crate::types::{
    Element, JobStatus, SubtitleSettings, SubtitleSettingsInput, TimingSegment,
    TranscriptionResult, VideoProject,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// Collaborators the pipeline needs for every job; shared across workers.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: JobStore,
    pub daemon: Arc<DaemonSupervisor>,
    pub config: Arc<EngineConfig>,
}

enum StepOutcome {
    Completed,
    Cancelled,
}

/// Drive job `job_id` from `pending` to a terminal status. Returns `Ok(())`
/// whether the job ended up completed or cancelled; returns the originating
/// error only when the job could not be marked `failed` either (store
/// corruption), which callers log but cannot otherwise act on.
pub async fn process(
    ctx: &PipelineContext,
    job_id: Uuid,
    cancel: CancellationToken,
) -> Result<(), CoreError> {
    let mut subtitle_path: Option<PathBuf> = None;

    let outcome = run_steps(ctx, job_id, &cancel, &mut subtitle_path).await;

    if let Some(path) = subtitle_path.take() {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(error = %e, path = %path.display(), "failed to remove temp subtitle file");
        }
    }

    match outcome {
        Ok(StepOutcome::Completed) | Ok(StepOutcome::Cancelled) => Ok(()),
        Err(err) => {
            fail(ctx, job_id, &err).await;
            Err(err)
        }
    }
}

async fn fail(ctx: &PipelineContext, job_id: Uuid, err: &CoreError) {
    let message = err.user_message();
    let _ = ctx
        .store
        .update(job_id, |job| job.error = Some(message.clone()))
        .await;
    let _ = ctx
        .store
        .transition(job_id, &[JobStatus::Processing], JobStatus::Failed)
        .await;
}

async fn mark_cancelled(ctx: &PipelineContext, job_id: Uuid) {
    let _ = ctx
        .store
        .transition(job_id, &[JobStatus::Processing], JobStatus::Cancelled)
        .await;
}

async fn run_steps(
    ctx: &PipelineContext,
    job_id: Uuid,
    cancel: &CancellationToken,
    subtitle_path: &mut Option<PathBuf>,
) -> Result<StepOutcome, CoreError> {
    // Step 1: pending -> processing.
    if ctx
        .store
        .transition(job_id, &[JobStatus::Pending], JobStatus::Processing)
        .await
        .is_err()
    {
        let current = ctx.store.get(job_id).await;
        if matches!(current.map(|j| j.status), Some(JobStatus::Cancelled)) {
            return Ok(StepOutcome::Cancelled);
        }
        return Err(CoreError::Internal(
            "job was not in pending state at pipeline start".to_string(),
        ));
    }
    ctx.store.update(job_id, |j| j.progress = 1).await?;

    let job = ctx
        .store
        .get(job_id)
        .await
        .ok_or_else(|| CoreError::Internal(format!("job {job_id} disappeared from store")))?;
    let project = job.config;

    // Step 2: probe every audio clip, build contiguous scene timings.
    let audio_elements = collect_audio(&project);
    if audio_elements.is_empty() {
        return Err(CoreError::InvalidInput(
            "project has no audio elements".to_string(),
        ));
    }

    let mut audio_durations = Vec::with_capacity(audio_elements.len());
    let mut scene_timings = Vec::with_capacity(audio_elements.len());
    let mut cursor = 0.0;
    for (src, _language) in &audio_elements {
        if cancel.is_cancelled() {
            mark_cancelled(ctx, job_id).await;
            return Ok(StepOutcome::Cancelled);
        }
        let duration = crate::probe::probe(&ctx.config.ffprobe_path, src, ctx.config.probe_timeout).await?;
        let start = cursor;
        let end = cursor + duration;
        scene_timings.push(TimingSegment { start, end });
        audio_durations.push(duration);
        cursor = end;
    }
    ctx.store.update(job_id, |j| j.progress = 10).await?;

    if cancel.is_cancelled() {
        mark_cancelled(ctx, job_id).await;
        return Ok(StepOutcome::Cancelled);
    }

    // Step 3: transcribe each clip. A per-clip failure degrades that scene
    // to "no subtitles" and is recorded as a warning; it never fails the job.
    let mut transcriptions = Vec::with_capacity(audio_elements.len());
    for (src, language) in &audio_elements {
        match transcription::transcribe(&ctx.daemon, src, language, ctx.config.transcribe_timeout)
            .await
        {
            Ok(result) => transcriptions.push(result),
            Err(e) => {
                warn!(src, error = %e, "transcription failed for clip, scene degrades to no subtitles");
                let warning = format!("transcription failed for {src}: {}", e.user_message());
                let _ = ctx.store.update(job_id, |j| j.warnings.push(warning)).await;
                transcriptions.push(TranscriptionResult::failed());
            }
        }
    }
    ctx.store.update(job_id, |j| j.progress = 40).await?;

    if cancel.is_cancelled() {
        mark_cancelled(ctx, job_id).await;
        return Ok(StepOutcome::Cancelled);
    }

    // Step 4: subtitle events + file, only if the project asked for one.
    if let Some((_language, settings_input)) = find_subtitle_element(&project) {
        let merged = SubtitleSettings::merge(settings_input, &ctx.config.default_subtitle_settings);
        let events = subtitles::generate(&transcriptions, &scene_timings, merged.style);
        let path = subtitles::write(&events, &merged, &ctx.config.temp_dir).await?;
        *subtitle_path = Some(path);
    }
    ctx.store.update(job_id, |j| j.progress = 50).await?;

    if cancel.is_cancelled() {
        mark_cancelled(ctx, job_id).await;
        return Ok(StepOutcome::Cancelled);
    }

    // Step 5: build the transcoder command. Any builder error fails the job.
    let built = command::build(
        &project,
        &audio_durations,
        &scene_timings,
        &ctx.config.output_dir,
        subtitle_path.as_deref(),
    )?;

    // Step 6: run the transcoder, mapping its 0-100 progress onto 50-99.
    let (progress_tx, mut progress_rx) = mpsc::channel(16);
    let progress_store = ctx.store.clone();
    let progress_task = tokio::spawn(async move {
        while let Some(pct) = progress_rx.recv().await {
            let mapped = 50 + ((pct as u32 * 49) / 100) as u8;
            let _ = progress_store.update(job_id, |j| j.progress = mapped).await;
        }
    });

    let run_result = runner::run(
        &ctx.config.ffmpeg_path,
        &built.argv,
        ctx.config.transcode_timeout,
        progress_tx,
        cancel,
    )
    .await;
    let _ = progress_task.await;

    if matches!(run_result, Err(CoreError::Cancelled)) {
        mark_cancelled(ctx, job_id).await;
        return Ok(StepOutcome::Cancelled);
    }
    run_result?;

    // Step 7: publish the output and complete.
    let output_id = built
        .output_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    ctx.store
        .update(job_id, |j| j.output_id = Some(output_id))
        .await?;
    ctx.store
        .transition(job_id, &[JobStatus::Processing], JobStatus::Completed)
        .await?;
    ctx.store.update(job_id, |j| j.progress = 100).await?;

    Ok(StepOutcome::Completed)
}

fn collect_audio(project: &VideoProject) -> Vec<(String, String)> {
    project
        .scenes
        .iter()
        .flat_map(|scene| scene.elements.iter())
        .filter_map(|e| match e {
            Element::Audio { src, language, .. } => Some((src.clone(), language.clone())),
            _ => None,
        })
        .collect()
}

fn find_subtitle_element(project: &VideoProject) -> Option<(&str, &SubtitleSettingsInput)> {
    project.elements.iter().find_map(|e| match e {
        Element::Subtitles { language, settings } => Some((language.as_str(), settings)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::types::{Quality, Scene};

    fn ctx() -> PipelineContext {
        let mut config = EngineConfig::from_env().expect("env config");
        config.ffprobe_path = "sleep".to_string();
        config.ffmpeg_path = "sleep".to_string();
        PipelineContext {
            store: JobStore::new(),
            daemon: Arc::new(DaemonSupervisor::new(config.clone())),
            config: Arc::new(config),
        }
    }

    fn project_no_audio() -> VideoProject {
        VideoProject {
            scenes: vec![Scene { elements: vec![] }],
            elements: vec![Element::Video {
                src: "https://h/bg.mp4".to_string(),
                duration: 10.0,
            }],
            quality: Quality::Standard,
            resolution: None,
        }
    }

    #[tokio::test]
    async fn project_without_audio_fails_the_job() {
        let ctx = ctx();
        let job = ctx.store.create(project_no_audio()).await;

        let result = process(&ctx, job.id, CancellationToken::new()).await;
        assert!(result.is_err());

        let stored = ctx.store.get(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.error.is_some());
    }

    #[tokio::test]
    async fn cancellation_requested_before_start_short_circuits() {
        let ctx = ctx();
        let job = ctx.store.create(project_no_audio()).await;
        ctx.store
            .transition(job.id, &[JobStatus::Pending], JobStatus::Cancelled)
            .await
            .unwrap();

        let result = process(&ctx, job.id, CancellationToken::new()).await;
        assert!(result.is_ok());

        let stored = ctx.store.get(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
    }

    #[test]
    fn collect_audio_preserves_scene_order() {
        let project = VideoProject {
            scenes: vec![
                Scene {
                    elements: vec![Element::Audio {
                        src: "a".to_string(),
                        duration: 0.0,
                        language: "en".to_string(),
                    }],
                },
                Scene {
                    elements: vec![Element::Audio {
                        src: "b".to_string(),
                        duration: 0.0,
                        language: "en".to_string(),
                    }],
                },
            ],
            elements: vec![],
            quality: Quality::Standard,
            resolution: None,
        };
        let audio = collect_audio(&project);
        assert_eq!(audio, vec![("a".to_string(), "en".to_string()), ("b".to_string(), "en".to_string())]);
    }

    #[test]
    fn finds_project_scoped_subtitle_element() {
        let project = VideoProject {
            scenes: vec![],
            elements: vec![
                Element::Video {
                    src: "https://h/bg.mp4".to_string(),
                    duration: 1.0,
                },
                Element::Subtitles {
                    language: "en".to_string(),
                    settings: SubtitleSettingsInput::default(),
                },
            ],
            quality: Quality::Standard,
            resolution: None,
        };
        assert!(find_subtitle_element(&project).is_some());
    }
}
