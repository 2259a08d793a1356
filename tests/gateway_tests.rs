// Connection acceptor, registry bookkeeping and HTTP routes

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use caption_gateway::config::StaticFilesConfig;
use caption_gateway::{create_router, AppState, Gateway, SessionConfig, SessionState};
use common::{eventually, FakeRecognizer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;

fn test_gateway(fake: &Arc<FakeRecognizer>) -> Arc<Gateway> {
    Arc::new(Gateway::new(fake.clone(), SessionConfig::default()))
}

async fn get(gateway: &Arc<Gateway>, uri: &str) -> (StatusCode, Option<String>, String) {
    let app = create_router(AppState::new(Arc::clone(gateway)), &StaticFilesConfig::default());
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_accept_registers_and_deregisters() {
    let fake = FakeRecognizer::new();
    let gateway = test_gateway(&fake);

    let (tx, _rx) = mpsc::channel(8);
    let session = gateway.accept_connection(tx).await;
    assert_eq!(gateway.registry().len().await, 1);
    assert!(gateway.registry().get(&session.id()).await.is_some());

    session.terminate();
    session.closed().await;

    let registry = gateway.registry().clone();
    tokio::time::timeout(Duration::from_secs(2), async {
        while !registry.is_empty().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session was not deregistered");
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let fake = FakeRecognizer::new();
    let gateway = test_gateway(&fake);

    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);
    let a = gateway.accept_connection(tx_a).await;
    let b = gateway.accept_connection(tx_b).await;
    assert!(a.wait_for_state(SessionState::Streaming).await);
    assert!(b.wait_for_state(SessionState::Streaming).await);
    assert_ne!(a.id(), b.id());

    eventually(|| fake.stream_count() == 2).await;

    // Whichever stream belongs to `a`, killing `b` leaves `a` streaming
    b.terminate();
    b.closed().await;
    assert_eq!(a.state(), SessionState::Streaming);
    assert_eq!(rx_b.recv().await, None);

    a.ingest_audio(vec![1, 2, 3]);
    eventually(|| a.stats().frames_forwarded == 1).await;
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test]
async fn test_shutdown_closes_every_session_quietly() {
    let fake = FakeRecognizer::new();
    let gateway = test_gateway(&fake);

    let mut receivers = Vec::new();
    let mut sessions = Vec::new();
    for _ in 0..3 {
        let (tx, rx) = mpsc::channel(8);
        sessions.push(gateway.accept_connection(tx).await);
        receivers.push(rx);
    }
    for session in &sessions {
        assert!(session.wait_for_state(SessionState::Streaming).await);
    }

    gateway.shutdown(Duration::from_secs(2)).await;

    assert!(gateway.registry().is_empty().await);
    for session in &sessions {
        assert_eq!(session.state(), SessionState::Closed);
    }
    // Shutdown is not an error from the client's point of view
    for rx in &mut receivers {
        assert_eq!(rx.recv().await, None);
    }
    assert_eq!(fake.opens(), 3);
    assert_eq!(fake.closes(), 3);
}

#[tokio::test]
async fn test_health() {
    let gateway = test_gateway(&FakeRecognizer::new());
    let (status, _, body) = get(&gateway, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_worklet_is_served_as_javascript() {
    let gateway = test_gateway(&FakeRecognizer::new());
    let (status, content_type, body) = get(&gateway, "/transcription-worklet-processor.js").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/javascript"));
    assert!(body.contains("registerProcessor(\"pcm-processor\""));
}

#[tokio::test]
async fn test_session_listing() {
    let fake = FakeRecognizer::new();
    let gateway = test_gateway(&fake);

    let (status, _, body) = get(&gateway, "/sessions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");

    let (tx, _rx) = mpsc::channel(8);
    let session = gateway.accept_connection(tx).await;
    assert!(session.wait_for_state(SessionState::Streaming).await);

    let (status, _, body) = get(&gateway, "/sessions").await;
    assert_eq!(status, StatusCode::OK);
    let list: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["session_id"], session.id().to_string());
    assert_eq!(list[0]["state"], "streaming");

    let (status, _, body) = get(&gateway, &format!("/sessions/{}", session.id())).await;
    assert_eq!(status, StatusCode::OK);
    let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["upstream_opens"], 1);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let gateway = test_gateway(&FakeRecognizer::new());

    let (status, _, body) = get(&gateway, &format!("/sessions/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("not found"));

    let (status, _, _) = get(&gateway, "/sessions/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_files_fallback() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>captions</h1>").unwrap();

    let gateway = test_gateway(&FakeRecognizer::new());
    let static_files = StaticFilesConfig {
        dir: Some(dir.path().to_string_lossy().to_string()),
        cors: false,
    };
    let app = create_router(AppState::new(gateway), &static_files);

    let response = app
        .oneshot(Request::builder().uri("/index.html").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"<h1>captions</h1>");
}
