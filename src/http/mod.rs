//! HTTP / WebSocket surface
//!
//! - GET /transcribe - WebSocket: binary PCM frames in, JSON transcripts out
//! - GET /sessions - Stats of live sessions
//! - GET /sessions/:id - Stats of one session
//! - GET /transcription-worklet-processor.js - Browser capture worklet
//! - GET /health - Health check

mod handlers;
mod routes;
mod socket;
mod state;

pub use handlers::WORKLET_SOURCE;
pub use routes::create_router;
pub use socket::serve_socket;
pub use state::AppState;
