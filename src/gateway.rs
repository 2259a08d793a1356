use crate::error::CloseReason;
use crate::session::{Session, SessionConfig, SessionRegistry};
use crate::transcript::ServerMessage;
use crate::upstream::RecognizerAdapter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Accepts client connections and gives each one its own session.
///
/// The recognizer adapter is injected so tests can substitute a fake.
pub struct Gateway {
    adapter: Arc<dyn RecognizerAdapter>,
    config: SessionConfig,
    registry: SessionRegistry,
}

impl Gateway {
    pub fn new(adapter: Arc<dyn RecognizerAdapter>, config: SessionConfig) -> Self {
        Self {
            adapter,
            config,
            registry: SessionRegistry::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Create and register a session for a new client.
    ///
    /// Transcripts and the terminal error (if any) are pushed to `outbound`;
    /// the channel closes when the session ends. The caller feeds inbound
    /// frames to [`Session::ingest_audio`] and calls [`Session::terminate`]
    /// when the client goes away.
    pub async fn accept_connection(&self, outbound: mpsc::Sender<ServerMessage>) -> Session {
        let (session, task) = Session::spawn(Arc::clone(&self.adapter), self.config.clone(), outbound);
        let id = session.id();

        self.registry.insert(session.clone()).await;
        info!(session_id = %id, "Client connected for transcription");

        let registry = self.registry.clone();
        tokio::spawn(async move {
            if let Err(e) = task.await {
                warn!(session_id = %id, "Session task failed: {}", e);
            }
            registry.remove(&id).await;
        });

        session
    }

    /// Close every session and wait (bounded) for them to deregister
    pub async fn shutdown(&self, grace: Duration) {
        let count = self.registry.close_all(CloseReason::Shutdown).await;
        if count == 0 {
            return;
        }

        info!("Closing {} active session(s)", count);

        let drained = tokio::time::timeout(grace, async {
            while !self.registry.is_empty().await {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "{} session(s) still open after shutdown grace period",
                self.registry.len().await
            );
        }
    }
}
