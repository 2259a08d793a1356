use crate::gateway::Gateway;
use crate::transcript::ServerMessage;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Drive one client WebSocket: binary frames go to the session, session
/// output goes back as JSON text messages.
pub async fn serve_socket(gateway: Arc<Gateway>, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(gateway.config().outbound_queue);

    let session = gateway.accept_connection(out_tx).await;
    let session_id = session.id();

    // Ends when the session detaches (drops its sender) or the client is gone
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(err) => {
                    error!(error = %err, "failed to serialize websocket payload");
                    continue;
                }
            };
            if sender.send(Message::Text(payload)).await.is_err() {
                return;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let mut writer_done = false;
    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Binary(data))) => session.ingest_audio(data),
                Some(Ok(Message::Text(text))) => {
                    warn!(session_id = %session_id, len = text.len(), "unexpected text frame received");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    debug!(session_id = %session_id, error = %err, "websocket receive failed");
                    break;
                }
            },
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        }
    }

    session.terminate();

    if !writer_done {
        if let Err(err) = writer.await {
            error!(session_id = %session_id, error = %err, "websocket writer task failed");
        }
    }
}
