pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod session;
pub mod transcript;
pub mod upstream;

pub use config::Config;
pub use error::{CloseReason, ErrorClass, UpstreamError};
pub use gateway::Gateway;
pub use http::{create_router, AppState};
pub use session::{Session, SessionConfig, SessionRegistry, SessionState, SessionStats};
pub use transcript::{select_transcript, ErrorNotice, ServerMessage, TranscriptEvent};
pub use upstream::{
    RecognizeResponse, RecognizerAdapter, UpstreamEvent, UpstreamHandle, UpstreamStream,
    WebSocketRecognizer,
};
