//! Transcoder runner (§4.4, C4): spawns the transcoder, streams stderr on a
//! dedicated cooperative task, and parses progress without ever blocking the
//! child on a slow consumer.

use crate::error::CoreError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Run the transcoder with `argv`, delivering 0-100 progress samples to
/// `progress_sink`. Samples are dropped (never queued) when the sink isn't
/// ready, so a slow consumer never stalls transcoding. `cancel` lets a
/// caller terminate the child early (job cancellation, §5); it races the
/// budget timeout, and either one kills and reaps the child the same way.
pub async fn run(
    ffmpeg_path: &str,
    argv: &[String],
    budget: Duration,
    progress_sink: mpsc::Sender<u8>,
    cancel: &CancellationToken,
) -> Result<(), CoreError> {
    let mut cmd = Command::new(ffmpeg_path);
    cmd.args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| CoreError::Internal(format!("failed to spawn transcoder: {e}")))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| CoreError::Internal("transcoder stderr not piped".to_string()))?;

    let tail = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::<String>::new()));
    let tail_clone = tail.clone();
    let progress_task = tokio::spawn(async move {
        scan_progress(stderr, progress_sink, tail_clone).await;
    });

    let wait = async {
        let status = child
            .wait()
            .await
            .map_err(|e| CoreError::Internal(format!("failed to wait on transcoder: {e}")))?;
        Ok::<_, CoreError>(status)
    };

    let status = tokio::select! {
        result = timeout(budget, wait) => match result {
            Ok(result) => result,
            Err(_) => {
                warn!("transcoder exceeded its time budget, terminating");
                let _ = child.start_kill();
                let _ = child.wait().await;
                progress_task.abort();
                return Err(CoreError::TranscodeTimeout);
            }
        },
        _ = cancel.cancelled() => {
            warn!("transcoder cancelled, terminating");
            let _ = child.start_kill();
            let _ = child.wait().await;
            progress_task.abort();
            return Err(CoreError::Cancelled);
        }
    };

    let _ = progress_task.await;

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => {
            let tail_text = tail.lock().await.join("\n");
            error!(exit_status = ?status.code(), %tail_text, "transcoder failed");
            Err(CoreError::TranscodeFailed(format!(
                "exit status {:?}: {}",
                status.code(),
                tail_text
            )))
        }
        Err(e) => Err(e),
    }
}

const STDERR_TAIL_LINES: usize = 20;

async fn scan_progress(
    stderr: tokio::process::ChildStderr,
    progress_sink: mpsc::Sender<u8>,
    tail: std::sync::Arc<tokio::sync::Mutex<Vec<String>>>,
) {
    let reader = BufReader::new(stderr);
    let mut lines = reader.lines();
    let mut total_seconds: Option<f64> = None;

    while let Ok(Some(line)) = lines.next_line().await {
        {
            let mut tail = tail.lock().await;
            tail.push(line.clone());
            if tail.len() > STDERR_TAIL_LINES {
                tail.remove(0);
            }
        }

        if total_seconds.is_none() {
            if let Some(seconds) = parse_total_duration(&line) {
                debug!(seconds, "transcoder reported total duration");
                total_seconds = Some(seconds);
            }
        }

        if let (Some(total), Some(current)) = (total_seconds, parse_current_time(&line)) {
            if total > 0.0 {
                let pct = ((current / total) * 100.0).floor().clamp(0.0, 100.0) as u8;
                // Never block transcoding on a slow progress consumer.
                let _ = progress_sink.try_send(pct);
            }
        }
    }
}

/// Matches the first `Duration: HH:MM:SS.CC` line.
fn parse_total_duration(line: &str) -> Option<f64> {
    let rest = line.split("Duration:").nth(1)?;
    let time_str = rest.split(',').next()?;
    parse_hms(time_str.trim())
}

/// Matches `time=HH:MM:SS.CC` progress lines.
fn parse_current_time(line: &str) -> Option<f64> {
    let rest = line.split("time=").nth(1)?;
    let time_str = rest.split_whitespace().next()?;
    parse_hms(time_str)
}

fn parse_hms(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
