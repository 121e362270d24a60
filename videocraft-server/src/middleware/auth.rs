//! Thin bearer-token auth gate: a shared secret checked against the
//! `Authorization` header on every non-health request, as a single
//! `axum::middleware::from_fn_with_state` layer. A full JWT/session system
//! is out of scope for this service.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use constant_time_eq::constant_time_eq;

use crate::errors::AppError;
use crate::AppState;

pub async fn require_bearer_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.auth_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    // `constant_time_eq` compares lengths and bytes without early-exiting on
    // the first mismatch, so response latency can't leak how many leading
    // bytes matched.
    match provided {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(request).await)
        }
        _ => Err(AppError::unauthorized("missing or invalid bearer token")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_tokens_match() {
        assert!(constant_time_eq(b"secret-token", b"secret-token"));
    }

    #[test]
    fn differing_tokens_do_not_match() {
        assert!(!constant_time_eq(b"secret-token", b"other-token"));
        assert!(!constant_time_eq(b"short", b"longer-token"));
    }
}
