//! Media probe (§4.2, C2).
//!
//! The only place an audio duration is trusted — scene timings are always
//! measured here, never inferred from declarative fields (§9).

use crate::error::CoreError;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

/// Probe `url` with the external probe tool (ffprobe) and return its
/// duration in seconds. Never builds a shell string — argv only.
pub async fn probe(ffprobe_path: &str, url: &str, budget: Duration) -> Result<f64, CoreError> {
    let run = async {
        let output = Command::new(ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CoreError::ProbeFailed(format!("failed to spawn probe tool: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(%stderr, "probe tool exited non-zero");
            return Err(CoreError::ProbeFailed(format!(
                "probe tool exited with {:?}",
                output.status.code()
            )));
        }

        let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| CoreError::ProbeFailed(format!("could not parse probe output: {e}")))?;

        let duration_str = parsed
            .format
            .duration
            .ok_or_else(|| CoreError::ProbeFailed("probe output missing duration".to_string()))?;

        let duration: f64 = duration_str
            .parse()
            .map_err(|e| CoreError::ProbeFailed(format!("unparseable duration: {e}")))?;

        debug!(url, duration, "probed media duration");
        Ok(duration)
    };

    match timeout(budget, run).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::ProbeTimeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_timeout_distinct_from_failure() {
        // `sleep` is not ffprobe but is present everywhere; it never writes
        // valid JSON, so a short budget exercises the timeout arm directly
        // without depending on a real ffprobe binary being installed.
        let result = probe("sleep", "2", Duration::from_millis(10)).await;
        assert!(matches!(result, Err(CoreError::ProbeTimeout)));
    }
}
