//! HTTP error surface wrapping [`videocraft_core::CoreError`]: a status
//! plus a sanitized message, serialized as `{"error": {...}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use videocraft_core::CoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

/// Maps a library error onto its §6 HTTP shape: `overloaded` is retryable
/// (503), validation errors are 400/422-shaped client errors, everything
/// else is a sanitized 500. Never forwards `CoreError`'s `Display` text —
/// only `user_message()`, which is defined to be safe to return to a client.
impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::InvalidInput(_) | CoreError::InvalidUrl(_) | CoreError::DomainNotAllowed => {
                StatusCode::BAD_REQUEST
            }
            CoreError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Cancelled => StatusCode::CONFLICT,
            CoreError::ProbeTimeout
            | CoreError::TranscriptionTimeout
            | CoreError::TranscodeTimeout => StatusCode::GATEWAY_TIMEOUT,
            CoreError::TranscriptionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code(), err.user_message())
    }
}
