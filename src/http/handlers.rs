use super::socket;
use super::state::AppState;
use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Browser audio-capture worklet served to clients
pub const WORKLET_SOURCE: &str = include_str!("assets/transcription-worklet-processor.js");

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// GET /transcribe
/// Upgrade to a WebSocket carrying audio in and transcripts out
pub async fn transcribe(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    debug!("Transcription WebSocket upgrade requested");
    ws.on_upgrade(move |upgraded| socket::serve_socket(state.gateway, upgraded))
}

/// GET /sessions
/// Stats of all live sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.gateway.registry().list().await)
}

/// GET /sessions/:session_id
/// Stats of one session
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let session = match Uuid::parse_str(&session_id) {
        Ok(id) => state.gateway.registry().get(&id).await,
        Err(_) => None,
    };

    match session {
        Some(session) => (StatusCode::OK, Json(session.stats())).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /transcription-worklet-processor.js
pub async fn worklet_processor() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        WORKLET_SOURCE,
    )
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
