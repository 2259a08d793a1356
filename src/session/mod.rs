//! Transcription sessions
//!
//! One `Session` per client connection:
//! - Relays inbound audio to the current upstream recognizer stream
//! - Forwards normalized transcripts back in upstream order
//! - Replaces the upstream stream after transient failures, buffering a
//!   bounded amount of audio meanwhile
//! - Closes on client disconnect, fatal upstream errors, or an exhausted
//!   retry budget

mod buffer;
mod config;
mod registry;
mod session;
mod state;
mod stats;

pub use buffer::PendingAudio;
pub use config::SessionConfig;
pub use registry::SessionRegistry;
pub use session::Session;
pub use state::{Effect, Input, SessionMachine, SessionState};
pub use stats::SessionStats;
