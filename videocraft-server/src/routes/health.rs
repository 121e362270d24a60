//! `GET /healthz` — liveness probe reporting whether the transcription
//! daemon is currently reachable.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub transcription_daemon_healthy: bool,
}

pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        transcription_daemon_healthy: state.daemon.healthy().await,
    })
}
