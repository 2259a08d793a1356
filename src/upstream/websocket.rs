use super::adapter::{RecognizerAdapter, UpstreamEvent, UpstreamHandle, UpstreamStream};
use super::classify::{classify_http_status, status_error};
use super::types::RecognizeResponse;
use crate::config::{AudioConfig, AudioEncoding, UpstreamConfig};
use crate::error::UpstreamError;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, Request};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_QUEUE: usize = 64;

/// First message on every stream
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingConfigMessage {
    pub streaming_config: StreamingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingConfig {
    pub config: RecognitionConfig,
    pub interim_results: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionConfig {
    pub encoding: AudioEncoding,
    pub sample_rate_hertz: u32,
    pub language_code: String,
}

impl StreamingConfigMessage {
    pub fn new(audio: &AudioConfig) -> Self {
        Self {
            streaming_config: StreamingConfig {
                config: RecognitionConfig {
                    encoding: audio.encoding,
                    sample_rate_hertz: audio.sample_rate_hertz,
                    language_code: audio.language_code.clone(),
                },
                interim_results: audio.interim_results,
            },
        }
    }
}

/// Inbound text message: either results or an error status
#[derive(Debug, Deserialize)]
struct ProviderMessage {
    #[serde(flatten)]
    response: RecognizeResponse,
    #[serde(default)]
    error: Option<ProviderStatus>,
}

#[derive(Debug, Deserialize)]
struct ProviderStatus {
    code: i32,
    #[serde(default)]
    message: String,
}

/// Recognizer reached over a WebSocket speaking the JSON streaming protocol
pub struct WebSocketRecognizer {
    config: UpstreamConfig,
}

impl WebSocketRecognizer {
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }

    fn request(&self) -> Result<Request<()>, UpstreamError> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| UpstreamError::fatal(format!("invalid upstream url: {}", e)))?;

        if let Some(key) = &self.config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| UpstreamError::fatal(format!("invalid api key: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        Ok(request)
    }
}

#[async_trait::async_trait]
impl RecognizerAdapter for WebSocketRecognizer {
    async fn open(&self, audio: &AudioConfig) -> Result<UpstreamStream, UpstreamError> {
        let request = self.request()?;

        debug!("Connecting to recognizer at {}", self.config.url);

        let (stream, _) = timeout(self.config.connect_timeout(), connect_async(request))
            .await
            .map_err(|_| UpstreamError::transient("timed out connecting to recognizer"))?
            .map_err(connect_error)?;

        let (mut sink, source) = stream.split();

        let start = serde_json::to_string(&StreamingConfigMessage::new(audio))
            .map_err(|e| UpstreamError::fatal(format!("failed to encode streaming config: {}", e)))?;

        sink.send(Message::Text(start))
            .await
            .map_err(|e| UpstreamError::transient(format!("failed to send streaming config: {}", e)))?;

        let (frame_tx, frame_rx) = mpsc::channel(self.config.send_queue);
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);

        let writer = tokio::spawn(write_frames(sink, frame_rx));
        let reader = tokio::spawn(read_events(source, event_tx));

        info!("Recognizer stream opened ({})", self.config.url);

        Ok(UpstreamStream {
            handle: Box::new(WebSocketHandle {
                frames: Some(frame_tx),
                writer: Some(writer),
                reader,
                dropped: 0,
            }),
            events: event_rx,
        })
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

fn connect_error(err: tungstenite::Error) -> UpstreamError {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status().as_u16();
            UpstreamError {
                class: classify_http_status(status),
                message: format!("recognizer rejected connection with HTTP {}", status),
            }
        }
        tungstenite::Error::Url(e) => UpstreamError::fatal(format!("invalid upstream url: {}", e)),
        other => UpstreamError::transient(format!("failed to connect to recognizer: {}", other)),
    }
}

/// Write side of a WebSocket recognizer stream
struct WebSocketHandle {
    frames: Option<mpsc::Sender<Vec<u8>>>,
    writer: Option<JoinHandle<()>>,
    reader: JoinHandle<()>,
    /// Frames lost to a full send queue
    dropped: u64,
}

impl UpstreamHandle for WebSocketHandle {
    fn write(&mut self, frame: Vec<u8>) -> Result<(), UpstreamError> {
        let Some(frames) = &self.frames else {
            return Err(UpstreamError::transient("recognizer stream already closed"));
        };

        match frames.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(frame)) => {
                self.dropped += 1;
                if self.dropped == 1 || self.dropped % 100 == 0 {
                    warn!(
                        dropped_total = self.dropped,
                        "Recognizer send queue full, dropping {} byte frame",
                        frame.len()
                    );
                }
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                Err(UpstreamError::transient("recognizer connection lost"))
            }
        }
    }

    fn close(mut self: Box<Self>) {
        // Dropping the sender lets the writer send a close frame and exit
        self.frames.take();
        self.writer.take();
        self.reader.abort();
    }
}

impl Drop for WebSocketHandle {
    fn drop(&mut self) {
        self.reader.abort();
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

async fn write_frames(mut sink: SplitSink<Socket, Message>, mut frames: mpsc::Receiver<Vec<u8>>) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = sink.send(Message::Binary(frame)).await {
            debug!("Recognizer write failed: {}", e);
            return;
        }
    }

    if let Err(e) = sink.send(Message::Close(None)).await {
        debug!("Failed to send close frame to recognizer: {}", e);
    }
}

async fn read_events(mut source: SplitStream<Socket>, events: mpsc::Sender<UpstreamEvent>) {
    while let Some(message) = source.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                let _ = events
                    .send(UpstreamEvent::Error(UpstreamError::transient(format!(
                        "recognizer connection failed: {}",
                        e
                    ))))
                    .await;
                return;
            }
        };

        match message {
            Message::Text(text) => match serde_json::from_str::<ProviderMessage>(&text) {
                Ok(ProviderMessage {
                    error: Some(status),
                    ..
                }) => {
                    let _ = events
                        .send(UpstreamEvent::Error(status_error(status.code, &status.message)))
                        .await;
                    return;
                }
                Ok(ProviderMessage { response, .. }) => {
                    if events.send(UpstreamEvent::Response(response)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let preview: String = text.chars().take(200).collect();
                    warn!("Invalid recognizer payload: {} (body: {})", e, preview);
                }
            },
            Message::Close(frame) => {
                let reason = match frame {
                    Some(frame) => format!(
                        "recognizer closed stream (code: {}, reason: {})",
                        frame.code, frame.reason
                    ),
                    None => "recognizer closed stream".to_string(),
                };
                let _ = events
                    .send(UpstreamEvent::Error(UpstreamError::transient(reason)))
                    .await;
                return;
            }
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }

    let _ = events
        .send(UpstreamEvent::Error(UpstreamError::transient(
            "recognizer stream ended",
        )))
        .await;
}
