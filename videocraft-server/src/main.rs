//! Videocraft server: the HTTP surface in front of the job orchestration
//! engine (`videocraft_core`) — a clap-parsed `Args`, an `AppState` shared
//! across handlers, a `tracing_subscriber` init, and an `axum::serve` loop.

pub mod config;
pub mod dto;
pub mod errors;
pub mod middleware;
pub mod routes;

use axum::Router;
use clap::Parser;
use config::ServerConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use videocraft_core::pipeline::{self, PipelineContext};
use videocraft_core::pool::WorkerPool;
use videocraft_core::store::JobStore;
use videocraft_core::transcription::DaemonSupervisor;

#[derive(Parser, Debug)]
#[command(name = "videocraft-server")]
#[command(about = "Headless video-composition job service")]
struct Args {
    #[arg(long, env = "VIDEOCRAFT_SERVER_PORT")]
    port: Option<u16>,

    #[arg(long, env = "VIDEOCRAFT_SERVER_HOST")]
    host: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    pub pool: Arc<WorkerPool>,
    pub daemon: Arc<DaemonSupervisor>,
    pub config: Arc<ServerConfig>,
    /// Per-job cancellation handles, populated while a job is in flight on a
    /// worker so `POST /jobs/:id/cancel` can reach it (§4.11/§5).
    pub cancellations: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "videocraft_server=info,videocraft_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.engine.ensure_directories()?;
    info!(output_dir = %config.engine.output_dir.display(), "storage directories ready");

    let config = Arc::new(config);
    let store = JobStore::new();
    let daemon = Arc::new(DaemonSupervisor::new(config.engine.clone()));
    let cancellations: Arc<RwLock<HashMap<Uuid, CancellationToken>>> =
        Arc::new(RwLock::new(HashMap::new()));

    let pipeline_ctx = PipelineContext {
        store: store.clone(),
        daemon: daemon.clone(),
        config: Arc::new(config.engine.clone()),
    };

    let pool_cancellations = cancellations.clone();
    let pool = Arc::new(WorkerPool::start(
        config.engine.workers,
        config.engine.queue_capacity,
        move |job_id| {
            let ctx = pipeline_ctx.clone();
            let cancellations = pool_cancellations.clone();
            async move {
                let token = CancellationToken::new();
                cancellations.write().await.insert(job_id, token.clone());
                let result = pipeline::process(&ctx, job_id, token).await;
                cancellations.write().await.remove(&job_id);
                if let Err(e) = result {
                    error!(%job_id, error = %e, "pipeline run ended in error");
                }
            }
        },
    ));

    let state = AppState {
        store,
        pool: pool.clone(),
        daemon: daemon.clone(),
        config: config.clone(),
        cancellations,
    };

    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("starting videocraft server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(pool, daemon))
        .await?;

    Ok(())
}

fn create_app(state: AppState) -> Router {
    let cors = if state.config.cors_allowed_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = state
            .config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    let api = routes::create_api_router()
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_bearer_token,
        ));

    Router::new()
        .route("/healthz", axum::routing::get(routes::health::healthz))
        .merge(api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Waits for Ctrl-C, then drains the worker pool and shuts the
/// transcription daemon down last (§5: "shutting down the service shuts
/// down the daemon last").
async fn shutdown_signal(pool: Arc<WorkerPool>, daemon: Arc<DaemonSupervisor>) {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("failed to install ctrl-c handler, shutting down immediately");
        return;
    }
    info!("shutdown signal received, draining worker pool");

    if pool.stop(Duration::from_secs(30)).await.is_err() {
        warn!("worker pool did not drain within the shutdown budget");
    }

    daemon.shutdown().await;
    info!("shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use serde_json::json;

    fn test_state() -> AppState {
        let mut engine = videocraft_core::config::EngineConfig::from_env().expect("env config");
        let tmp = tempfile::tempdir().expect("tempdir");
        engine.output_dir = tmp.path().join("output");
        engine.temp_dir = tmp.path().join("tmp");
        std::mem::forget(tmp); // keep the directory alive for the test's lifetime

        let config = Arc::new(ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_allowed_origins: vec![],
            auth_token: None,
            engine: engine.clone(),
        });
        let store = JobStore::new();
        let daemon = Arc::new(DaemonSupervisor::new(engine.clone()));
        let pool = Arc::new(WorkerPool::start(0, 4, |_id| async {}));

        AppState {
            store,
            pool,
            daemon,
            config,
            cancellations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let app = create_app(test_state());
        let server = TestServer::new(app).unwrap();
        let response = server.get("/healthz").await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn submission_with_no_background_video_is_rejected() {
        let app = create_app(test_state());
        let server = TestServer::new(app).unwrap();
        let response = server
            .post("/jobs")
            .json(&json!({
                "scenes": [],
                "elements": [],
            }))
            .await;
        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn auth_rejects_missing_bearer_token_when_configured() {
        let mut state = test_state();
        state.config = Arc::new(ServerConfig {
            auth_token: Some("s3cret".to_string()),
            ..(*state.config).clone()
        });
        let app = create_app(state);
        let server = TestServer::new(app).unwrap();
        let response = server
            .post("/jobs")
            .json(&json!({ "scenes": [], "elements": [] }))
            .await;
        response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_job_id_returns_not_found() {
        let app = create_app(test_state());
        let server = TestServer::new(app).unwrap();
        let response = server.get(&format!("/jobs/{}", Uuid::new_v4())).await;
        response.assert_status_not_found();
    }
}
