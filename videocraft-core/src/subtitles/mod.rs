//! Subtitle synthesis — event generation (C5) and file serialization (C6),
//! §4.5/§4.6.

pub mod events;
pub mod writer;

pub use events::generate;
pub use writer::write;
