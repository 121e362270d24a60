//! Transcription client (§4.8, C8) — the pipeline-facing API in front of the
//! daemon supervisor: ensure the daemon is up, send one transcribe request,
//! map the response (or any failure) onto `CoreError`.

use super::daemon::DaemonSupervisor;
use super::protocol::Request;
use crate::error::CoreError;
use crate::types::TranscriptionResult;
use std::time::Duration;
use tracing::warn;

pub async fn transcribe(
    daemon: &DaemonSupervisor,
    url: &str,
    language: &str,
    budget: Duration,
) -> Result<TranscriptionResult, CoreError> {
    daemon.ensure_running().await?;

    let request = Request::transcribe(url, language);
    let response = daemon.send(&request, budget).await?;

    if !response.success {
        let message = response
            .error
            .unwrap_or_else(|| "transcription daemon reported failure".to_string());
        return Err(CoreError::TranscriptionFailed(message));
    }

    let text = response.text.unwrap_or_default();
    if text.trim().is_empty() {
        warn!(url, "transcription succeeded with empty text");
    }

    Ok(TranscriptionResult {
        text,
        language: response.language.unwrap_or_else(|| language.to_string()),
        duration: response.duration.unwrap_or(0.0),
        word_timestamps: response.word_timestamps.unwrap_or_default(),
        success: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_still_a_success_result() {
        // Regression guard: an empty transcript is a legitimate outcome
        // (silent scene) and must not be coerced into a failure by the
        // client layer — that decision belongs to subtitle generation
        // (§4.5), which already skips scenes with empty text.
        let result = TranscriptionResult {
            text: String::new(),
            language: "en".to_string(),
            duration: 1.0,
            word_timestamps: vec![],
            success: true,
        };
        assert!(result.success);
        assert!(result.text.is_empty());
    }
}
