//! Error taxonomy (§7).
//!
//! Split between a library error enum and a thin, status-carrying web
//! error: `CoreError` lives here with a machine `code()` and a sanitized
//! `user_message()`; `videocraft-server::errors::AppError` wraps it for
//! the HTTP surface.

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("domain not allowed")]
    DomainNotAllowed,

    #[error("media probe failed: {0}")]
    ProbeFailed(String),

    #[error("media probe timed out")]
    ProbeTimeout,

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("transcription timed out")]
    TranscriptionTimeout,

    #[error("transcription daemon unavailable")]
    TranscriptionUnavailable,

    #[error("transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("transcode timed out")]
    TranscodeTimeout,

    #[error("queue is full")]
    Overloaded,

    #[error("job was cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Machine-readable code, stable across releases; never includes the
    /// offending input so it is always safe to return to a client.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidUrl(_) => "invalid_url",
            Self::DomainNotAllowed => "domain_not_allowed",
            Self::ProbeFailed(_) => "probe_failed",
            Self::ProbeTimeout => "probe_timeout",
            Self::TranscriptionFailed(_) => "transcription_failed",
            Self::TranscriptionTimeout => "transcription_timeout",
            Self::TranscriptionUnavailable => "transcription_unavailable",
            Self::TranscodeFailed(_) => "transcode_failed",
            Self::TranscodeTimeout => "transcode_timeout",
            Self::Overloaded => "overloaded",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }

    /// Sanitized message safe to show a client. Security-relevant variants
    /// never reveal which §4.1 subpattern matched.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidUrl(_) => "one or more media URLs are invalid".to_string(),
            Self::DomainNotAllowed => "one or more media URLs use a disallowed domain".to_string(),
            Self::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}
