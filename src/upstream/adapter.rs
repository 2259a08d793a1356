use super::types::RecognizeResponse;
use crate::config::AudioConfig;
use crate::error::UpstreamError;
use tokio::sync::mpsc;

/// Something the recognizer reported on an open stream
#[derive(Debug, Clone)]
pub enum UpstreamEvent {
    Response(RecognizeResponse),
    Error(UpstreamError),
}

/// A freshly opened upstream stream: the write side plus its event feed
pub struct UpstreamStream {
    pub handle: Box<dyn UpstreamHandle>,
    pub events: mpsc::Receiver<UpstreamEvent>,
}

/// Streaming speech recognizer
///
/// Implementations translate provider-specific failures into
/// [`ErrorClass`](crate::error::ErrorClass) so callers never see native codes.
#[async_trait::async_trait]
pub trait RecognizerAdapter: Send + Sync {
    /// Open a new recognition stream configured for `audio`
    async fn open(&self, audio: &AudioConfig) -> Result<UpstreamStream, UpstreamError>;

    /// Adapter name for logging
    fn name(&self) -> &str;
}

/// Write side of one live upstream stream
pub trait UpstreamHandle: Send {
    /// Queue an audio frame. Must not wait on network I/O.
    fn write(&mut self, frame: Vec<u8>) -> Result<(), UpstreamError>;

    /// Release the stream. Consumes the handle; a closed stream is never reused.
    fn close(self: Box<Self>);
}
