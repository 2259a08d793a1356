use crate::config::{AudioConfig, BackpressurePolicy, Config};

/// Per-session settings, fixed for the session's lifetime
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Audio format negotiated once and sent to every upstream stream
    pub audio: AudioConfig,

    /// Consecutive failed opens tolerated before giving up
    pub max_open_attempts: u32,

    /// Byte capacity of the buffer used while no upstream stream is valid
    pub pending_capacity_bytes: usize,

    /// Capacity of the session's inbound event queue
    pub inbound_queue: usize,

    /// Capacity of the queue towards the client
    pub outbound_queue: usize,

    pub backpressure: BackpressurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            audio: cfg.audio.clone(),
            max_open_attempts: cfg.recovery.max_open_attempts,
            pending_capacity_bytes: cfg.pending_audio_bytes(),
            inbound_queue: cfg.client.inbound_queue,
            outbound_queue: cfg.client.outbound_queue,
            backpressure: cfg.client.backpressure,
        }
    }
}
