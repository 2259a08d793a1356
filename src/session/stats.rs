use super::state::SessionState;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use uuid::Uuid;

/// Snapshot of a live transcription session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: Uuid,

    pub state: SessionState,

    /// When the client connected
    pub started_at: DateTime<Utc>,

    /// Last inbound audio frame
    pub last_activity: DateTime<Utc>,

    /// Frames written to an upstream stream (including flushed ones)
    pub frames_forwarded: u64,

    pub bytes_forwarded: u64,

    /// Frames lost to buffer overflow or shedding
    pub frames_dropped: u64,

    /// Upstream streams opened over the session's lifetime
    pub upstream_opens: u64,

    /// Completed Recovering → Streaming transitions
    pub recoveries: u64,

    pub transcripts_delivered: u64,
}

/// Counters shared between a session's actor and its handles
#[derive(Debug)]
pub(crate) struct SessionCounters {
    pub started_at: DateTime<Utc>,
    last_activity_ms: AtomicI64,
    pub frames_forwarded: AtomicU64,
    pub bytes_forwarded: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub upstream_opens: AtomicU64,
    pub recoveries: AtomicU64,
    pub transcripts_delivered: AtomicU64,
}

impl SessionCounters {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            last_activity_ms: AtomicI64::new(now.timestamp_millis()),
            frames_forwarded: AtomicU64::new(0),
            bytes_forwarded: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            upstream_opens: AtomicU64::new(0),
            recoveries: AtomicU64::new(0),
            transcripts_delivered: AtomicU64::new(0),
        }
    }

    pub fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn forwarded(&self, bytes: usize) {
        self.frames_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn dropped(&self, frames: usize) -> u64 {
        self.frames_dropped.fetch_add(frames as u64, Ordering::Relaxed) + frames as u64
    }

    pub fn snapshot(&self, session_id: Uuid, state: SessionState) -> SessionStats {
        let last_activity = Utc
            .timestamp_millis_opt(self.last_activity_ms.load(Ordering::Relaxed))
            .single()
            .unwrap_or(self.started_at);

        SessionStats {
            session_id,
            state,
            started_at: self.started_at,
            last_activity,
            frames_forwarded: self.frames_forwarded.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            upstream_opens: self.upstream_opens.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
            transcripts_delivered: self.transcripts_delivered.load(Ordering::Relaxed),
        }
    }
}
