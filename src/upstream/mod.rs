//! Upstream streaming recognizer
//!
//! - [`RecognizerAdapter`] / [`UpstreamHandle`]: the open / write / close seam
//!   the session talks to
//! - [`classify`]: provider status codes → transient / fatal
//! - [`WebSocketRecognizer`]: JSON streaming recognition over WebSocket

mod adapter;
pub mod classify;
mod types;
mod websocket;

pub use adapter::{RecognizerAdapter, UpstreamEvent, UpstreamHandle, UpstreamStream};
pub use types::{RecognitionAlternative, RecognitionResult, RecognizeResponse};
pub use websocket::{StreamingConfigMessage, WebSocketRecognizer};
