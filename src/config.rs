use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable prefix for overrides, e.g.
/// `CAPTION_GATEWAY_SERVICE__HTTP__PORT=4000`
pub const ENV_PREFIX: &str = "CAPTION_GATEWAY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub recovery: RecoveryConfig,
    pub upstream: UpstreamConfig,
    pub client: ClientConfig,
    pub static_files: StaticFilesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "caption-gateway".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

/// Audio encodings the recognizer accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioEncoding {
    Linear16,
    Flac,
    Mulaw,
    OggOpus,
    WebmOpus,
}

impl AudioEncoding {
    /// Bytes per sample for uncompressed encodings
    pub fn bytes_per_sample(&self) -> Option<u32> {
        match self {
            AudioEncoding::Linear16 => Some(2),
            AudioEncoding::Mulaw => Some(1),
            _ => None,
        }
    }
}

/// Fixed audio configuration of every session, sent once to upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub encoding: AudioEncoding,
    pub sample_rate_hertz: u32,
    pub language_code: String,
    pub interim_results: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            encoding: AudioEncoding::Linear16,
            sample_rate_hertz: 44100,
            language_code: "en-US".to_string(),
            interim_results: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Consecutive failed `open` attempts tolerated before the session gives up
    pub max_open_attempts: u32,

    /// How much audio is held while no upstream handle is valid
    pub pending_audio_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_open_attempts: 3,
            pending_audio_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub connect_timeout_ms: u64,
    pub send_queue: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/v1/speech:streamingRecognize".to_string(),
            api_key: None,
            connect_timeout_ms: 10_000,
            send_queue: 256,
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// What happens to inbound audio when the session cannot keep up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    ShedAudio,
    Disconnect,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub inbound_queue: usize,
    pub outbound_queue: usize,
    pub backpressure: BackpressurePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            inbound_queue: 256,
            outbound_queue: 64,
            backpressure: BackpressurePolicy::ShedAudio,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub dir: Option<String>,
    pub cors: bool,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self { dir: None, cors: true }
    }
}

impl Config {
    /// Load defaults, then `path` (if present), then environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate_hertz == 0 {
            bail!("audio.sample_rate_hertz must be greater than zero");
        }
        if self.audio.language_code.trim().is_empty() {
            bail!("audio.language_code must not be empty");
        }
        if self.recovery.max_open_attempts == 0 {
            bail!("recovery.max_open_attempts must be at least 1");
        }
        if self.client.inbound_queue == 0 || self.client.outbound_queue == 0 {
            bail!("client queue capacities must be at least 1");
        }
        if self.upstream.send_queue == 0 {
            bail!("upstream.send_queue must be at least 1");
        }
        if self.upstream.url.trim().is_empty() {
            bail!("upstream.url must not be empty");
        }
        Ok(())
    }

    /// Byte capacity of the buffer that holds audio while recovering
    pub fn pending_audio_bytes(&self) -> usize {
        // Compressed encodings have no fixed rate; assume 16-bit samples
        let bytes_per_sample = self.audio.encoding.bytes_per_sample().unwrap_or(2) as u64;
        let bytes = self.audio.sample_rate_hertz as u64 * bytes_per_sample
            * self.recovery.pending_audio_ms
            / 1000;
        bytes.max(1) as usize
    }
}
