use super::handlers;
use super::state::AppState;
use crate::config::StaticFilesConfig;
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState, static_files: &StaticFilesConfig) -> Router {
    let mut router = Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Audio in, transcripts out
        .route("/transcribe", get(handlers::transcribe))
        // Session queries
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/:session_id", get(handlers::get_session))
        // Client-side capture worklet
        .route(
            "/transcription-worklet-processor.js",
            get(handlers::worklet_processor),
        );

    if let Some(dir) = &static_files.dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    if static_files.cors {
        router = router.layer(CorsLayer::permissive());
    }

    // Add tracing middleware for request logging
    router.layer(TraceLayer::new_for_http()).with_state(state)
}
