//! Transcription daemon supervisor (§4.7, C7).
//!
//! Owns the long-lived AI child process end to end: spawn, readiness probe,
//! restart policy, shutdown. One short-lived child per job would be the
//! simpler model; this is a long-lived singleton child for the process'
//! whole life instead, given its startup cost, with a single exclusive
//! lock serializing every request/response round trip onto the one pipe.

use super::protocol::{Request, Response};
use crate::config::EngineConfig;
use crate::error::CoreError;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonLifecycleState {
    Stopped,
    Starting,
    Running,
}

struct Inner {
    state: DaemonLifecycleState,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    /// Timestamps of restarts within the sliding window (§4.7 restart
    /// policy); pruned on every check, which is what gives "quiet periods
    /// reset the counter" for free. The very first spawn is not a restart
    /// and never lands here.
    restart_events: Vec<Instant>,
    /// Whether the daemon has ever been spawned once; gates whether the
    /// next spawn attempt is the free initial start or a budgeted restart.
    started_once: bool,
    shut_down: bool,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: DaemonLifecycleState::Stopped,
            child: None,
            stdin: None,
            stdout: None,
            restart_events: Vec::new(),
            started_once: false,
            shut_down: false,
        }
    }
}

pub struct DaemonSupervisor {
    config: EngineConfig,
    inner: Mutex<Inner>,
}

impl DaemonSupervisor {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    pub async fn healthy(&self) -> bool {
        self.inner.lock().await.state == DaemonLifecycleState::Running
    }

    /// Ensure the daemon child is spawned, reaped if it exited, and ready to
    /// accept requests. Holds the supervisor's single lock for the whole
    /// operation, which also serializes it against concurrent `send` calls.
    pub async fn ensure_running(&self) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().await;

        if inner.shut_down {
            return Err(CoreError::TranscriptionUnavailable);
        }

        if let Some(child) = inner.child.as_mut() {
            match child.try_wait() {
                Ok(None) => return Ok(()), // still alive
                Ok(Some(status)) => {
                    warn!(?status, "transcription daemon exited unexpectedly");
                    inner.child = None;
                    inner.stdin = None;
                    inner.stdout = None;
                    inner.state = DaemonLifecycleState::Stopped;
                }
                Err(e) => {
                    error!(%e, "failed to poll transcription daemon status");
                    inner.child = None;
                    inner.stdin = None;
                    inner.stdout = None;
                    inner.state = DaemonLifecycleState::Stopped;
                }
            }
        }

        if !self.consume_start_or_restart_budget(&mut inner) {
            error!("transcription daemon restart budget exhausted, staying stopped");
            return Err(CoreError::TranscriptionUnavailable);
        }

        self.spawn_and_wait_ready(&mut inner).await
    }

    /// The very first spawn is a start, not a restart, and is always
    /// allowed; only subsequent spawns draw from the restart budget.
    fn consume_start_or_restart_budget(&self, inner: &mut Inner) -> bool {
        if inner.started_once {
            self.restart_budget_available(inner)
        } else {
            inner.started_once = true;
            true
        }
    }

    /// At most `daemon_restart_max_attempts` restarts within
    /// `daemon_restart_window`; stale entries are pruned first, which also
    /// implements "quiet periods reset the counter".
    fn restart_budget_available(&self, inner: &mut Inner) -> bool {
        let now = Instant::now();
        let window = self.config.daemon_restart_window;
        inner
            .restart_events
            .retain(|t| now.duration_since(*t) <= window);

        if inner.restart_events.len() as u32 >= self.config.daemon_restart_max_attempts {
            false
        } else {
            inner.restart_events.push(now);
            true
        }
    }

    async fn spawn_and_wait_ready(&self, inner: &mut Inner) -> Result<(), CoreError> {
        inner.state = DaemonLifecycleState::Starting;
        info!("starting transcription daemon");

        let mut child = tokio::process::Command::new(&self.config.ai_runtime_path)
            .arg(&self.config.ai_script_path)
            .arg("--idle-timeout")
            .arg(self.config.daemon_idle_timeout.as_secs().to_string())
            .arg("--model")
            .arg(&self.config.model_name)
            .arg("--log-level")
            .arg(&self.config.log_level)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CoreError::Internal(format!("failed to spawn transcription daemon: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CoreError::Internal("daemon stdin not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoreError::Internal("daemon stdout not piped".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(stderr));
        }

        inner.child = Some(child);
        inner.stdin = Some(stdin);
        inner.stdout = Some(BufReader::new(stdout).lines());

        let probe = self.wait_until_ready(inner);
        match timeout(self.config.daemon_startup_timeout, probe).await {
            Ok(Ok(())) => {
                inner.state = DaemonLifecycleState::Running;
                info!("transcription daemon ready");
                Ok(())
            }
            Ok(Err(e)) => {
                inner.state = DaemonLifecycleState::Stopped;
                Err(e)
            }
            Err(_) => {
                inner.state = DaemonLifecycleState::Stopped;
                Err(CoreError::TranscriptionTimeout)
            }
        }
    }

    /// Send `{"action":"status"}` and read responses until one reports
    /// `success=true` and `model_loaded=true`; malformed lines are skipped
    /// with a warning rather than failing the probe outright.
    async fn wait_until_ready(&self, inner: &mut Inner) -> Result<(), CoreError> {
        loop {
            write_request(inner, &Request::status()).await?;

            let lines = inner
                .stdout
                .as_mut()
                .ok_or_else(|| CoreError::Internal("daemon stdout missing".to_string()))?;

            match lines.next_line().await {
                Ok(Some(line)) => match Response::from_line(&line) {
                    Ok(resp) if resp.success && resp.model_loaded.unwrap_or(false) => {
                        return Ok(());
                    }
                    Ok(_) => {
                        debug!("daemon not ready yet, retrying readiness probe");
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                    Err(e) => {
                        warn!(%e, raw = %line, "skipping malformed line during readiness probe");
                    }
                },
                Ok(None) => {
                    return Err(CoreError::Internal(
                        "daemon stdout closed during readiness probe".to_string(),
                    ));
                }
                Err(e) => {
                    return Err(CoreError::Internal(format!(
                        "failed reading daemon stdout during readiness probe: {e}"
                    )));
                }
            }
        }
    }

    /// Send one request and read its correlated response. The supervisor's
    /// lock is held for the whole round trip (§4.7/§5: "all requests flow
    /// under a single exclusive lock").
    pub async fn send(&self, request: &Request, budget: Duration) -> Result<Response, CoreError> {
        let mut inner = self.inner.lock().await;

        if inner.state != DaemonLifecycleState::Running {
            return Err(CoreError::TranscriptionUnavailable);
        }

        let round_trip = async {
            write_request(&mut inner, request).await?;
            read_matching_response(&mut inner, &request.id).await
        };

        match timeout(budget, round_trip).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::TranscriptionTimeout),
        }
    }

    /// Best-effort shutdown request, close stdin, wait up to 10s, then kill.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.shut_down = true;

        if inner.state != DaemonLifecycleState::Running {
            if let Some(mut child) = inner.child.take() {
                let _ = child.start_kill();
            }
            inner.state = DaemonLifecycleState::Stopped;
            return;
        }

        let _ = write_request(&mut inner, &Request::shutdown()).await;
        inner.stdin = None; // closes stdin

        if let Some(mut child) = inner.child.take() {
            match timeout(Duration::from_secs(10), child.wait()).await {
                Ok(_) => info!("transcription daemon exited gracefully"),
                Err(_) => {
                    warn!("transcription daemon did not exit in time, killing");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
        }

        inner.stdout = None;
        inner.state = DaemonLifecycleState::Stopped;
    }
}

async fn write_request(inner: &mut Inner, request: &Request) -> Result<(), CoreError> {
    let stdin = inner
        .stdin
        .as_mut()
        .ok_or_else(|| CoreError::Internal("daemon stdin missing".to_string()))?;
    let mut line = request
        .to_line()
        .map_err(|e| CoreError::Internal(format!("failed to serialize request: {e}")))?;
    line.push('\n');
    stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| CoreError::Internal(format!("failed to write to daemon stdin: {e}")))?;
    stdin
        .flush()
        .await
        .map_err(|e| CoreError::Internal(format!("failed to flush daemon stdin: {e}")))
}

async fn read_matching_response(inner: &mut Inner, expected_id: &str) -> Result<Response, CoreError> {
    let lines = inner
        .stdout
        .as_mut()
        .ok_or_else(|| CoreError::Internal("daemon stdout missing".to_string()))?;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match Response::from_line(&line) {
                Ok(resp) if resp.id == expected_id => return Ok(resp),
                Ok(resp) => {
                    warn!(got = %resp.id, expected = %expected_id, "dropping stale daemon response");
                }
                Err(e) => {
                    warn!(%e, raw = %line, "skipping malformed daemon response line");
                }
            },
            Ok(None) => {
                return Err(CoreError::TranscriptionFailed(
                    "daemon stdout closed".to_string(),
                ));
            }
            Err(e) => {
                return Err(CoreError::TranscriptionFailed(format!(
                    "failed reading daemon stdout: {e}"
                )));
            }
        }
    }
}

async fn log_stderr(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(daemon_stderr = %line, "transcription daemon stderr");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_budget_resets_after_quiet_window() {
        let mut inner = Inner::new();
        let now = Instant::now();
        // Simulate 5 restarts far in the past, outside a 1ms window.
        inner.restart_events = vec![now - Duration::from_secs(10); 5];

        let config = test_config_with_window(Duration::from_millis(1), 5);
        let supervisor = DaemonSupervisor::new(config);
        assert!(supervisor.restart_budget_available(&mut inner));
    }

    #[test]
    fn restart_budget_denies_after_max_attempts_within_window() {
        let mut inner = Inner::new();
        let now = Instant::now();
        inner.restart_events = vec![now; 5];

        let config = test_config_with_window(Duration::from_secs(300), 5);
        let supervisor = DaemonSupervisor::new(config);
        assert!(!supervisor.restart_budget_available(&mut inner));
    }

    #[test]
    fn initial_start_is_free_then_six_exits_exhaust_a_budget_of_five() {
        let mut inner = Inner::new();
        let config = test_config_with_window(Duration::from_secs(300), 5);
        let supervisor = DaemonSupervisor::new(config);

        // First start never touches the restart budget.
        assert!(supervisor.consume_start_or_restart_budget(&mut inner));
        assert!(inner.restart_events.is_empty());

        // Exits 1-5 are restarts 1-5, all within budget.
        for _ in 0..5 {
            assert!(supervisor.consume_start_or_restart_budget(&mut inner));
        }
        // The 6th exit's restart attempt is denied.
        assert!(!supervisor.consume_start_or_restart_budget(&mut inner));
    }

    fn test_config_with_window(window: Duration, max_attempts: u32) -> EngineConfig {
        let mut config = crate::config::EngineConfig::from_env().expect("env config");
        config.daemon_restart_window = window;
        config.daemon_restart_max_attempts = max_attempts;
        config
    }
}
