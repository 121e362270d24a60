//! Wire protocol for the transcription daemon (§6): newline-delimited JSON,
//! one request per line in, one response per line out, correlated by `id`.

use crate::types::WordTiming;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub id: String,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_timestamps: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Transcribe,
    Status,
    Shutdown,
}

impl Request {
    pub fn new(action: Action) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action,
            url: None,
            language: None,
            word_timestamps: None,
        }
    }

    pub fn transcribe(url: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            language: Some(language.into()),
            word_timestamps: Some(true),
            ..Self::new(Action::Transcribe)
        }
    }

    pub fn status() -> Self {
        Self::new(Action::Status)
    }

    pub fn shutdown() -> Self {
        Self::new(Action::Shutdown)
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub id: String,
    pub success: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub word_timestamps: Option<Vec<WordTiming>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub model_loaded: Option<bool>,
    #[serde(default)]
    pub model: Option<String>,
}

impl Response {
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcribe_request_serializes_expected_fields() {
        let req = Request::transcribe("https://h/a.mp3", "en");
        let line = req.to_line().unwrap();
        assert!(line.contains("\"action\":\"transcribe\""));
        assert!(line.contains("\"word_timestamps\":true"));
    }

    #[test]
    fn parses_success_response() {
        let line = r#"{"id":"abc","success":true,"text":"hi","language":"en","duration":1.0,"word_timestamps":[{"word":"hi","start":0.0,"end":0.4}]}"#;
        let resp = Response::from_line(line).unwrap();
        assert!(resp.success);
        assert_eq!(resp.text.as_deref(), Some("hi"));
    }

    #[test]
    fn parses_error_response() {
        let line = r#"{"id":"abc","success":false,"error":"boom"}"#;
        let resp = Response::from_line(line).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("boom"));
    }
}
