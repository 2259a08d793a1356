use super::session::Session;
use super::stats::SessionStats;
use crate::error::CloseReason;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-wide bookkeeping of live sessions (session_id → session)
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Session) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id(), session);
    }

    pub async fn remove(&self, id: &Uuid) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id)
    }

    pub async fn get(&self, id: &Uuid) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Stats of every live session, oldest first
    pub async fn list(&self) -> Vec<SessionStats> {
        let sessions = self.sessions.read().await;
        let mut stats: Vec<SessionStats> = sessions.values().map(Session::stats).collect();
        stats.sort_by_key(|s| s.started_at);
        stats
    }

    /// Ask every session to close; returns how many were asked
    pub async fn close_all(&self, reason: CloseReason) -> usize {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            session.close(reason.clone());
        }
        sessions.len()
    }
}
