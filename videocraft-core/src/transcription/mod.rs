//! Transcription subsystem: daemon supervisor (C7), client (C8), and the
//! NDJSON wire protocol (§4.7/§4.8/§6) tying them together.

pub mod client;
pub mod daemon;
pub mod protocol;

pub use client::transcribe;
pub use daemon::DaemonSupervisor;
pub use protocol::{Action, Request, Response};
