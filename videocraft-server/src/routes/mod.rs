pub mod health;
pub mod jobs;

use crate::AppState;
use axum::routing::{get, post};
use axum::Router;

/// API routes. State is attached once, at the top, by the caller.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(jobs::submit).get(jobs::list))
        .route("/jobs/:id", get(jobs::status))
        .route("/jobs/:id/cancel", post(jobs::cancel))
}
