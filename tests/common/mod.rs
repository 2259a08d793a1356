// Shared test helpers: a scriptable in-memory recognizer that counts
// opens and closes, plus a polling helper.

#![allow(dead_code)]

use caption_gateway::config::AudioConfig;
use caption_gateway::{RecognizeResponse, RecognizerAdapter, UpstreamError, UpstreamEvent, UpstreamHandle, UpstreamStream};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// One stream handed out by the fake recognizer
#[derive(Clone)]
pub struct FakeStream {
    events: mpsc::Sender<UpstreamEvent>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    closes: Arc<AtomicUsize>,
}

impl FakeStream {
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub async fn respond(&self, transcript: &str, is_final: bool) {
        self.events
            .send(UpstreamEvent::Response(RecognizeResponse::single(transcript, is_final)))
            .await
            .unwrap();
    }

    /// Like `respond`, but tolerates the session having dropped this stream
    pub async fn try_respond(&self, transcript: &str, is_final: bool) -> bool {
        self.events
            .send(UpstreamEvent::Response(RecognizeResponse::single(transcript, is_final)))
            .await
            .is_ok()
    }

    pub async fn fail(&self, err: UpstreamError) {
        self.events.send(UpstreamEvent::Error(err)).await.unwrap();
    }
}

struct FakeHandle {
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    closes: Arc<AtomicUsize>,
    total_closes: Arc<AtomicUsize>,
    leaks: Arc<AtomicUsize>,
    closed: bool,
}

impl UpstreamHandle for FakeHandle {
    fn write(&mut self, frame: Vec<u8>) -> Result<(), UpstreamError> {
        self.written.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(mut self: Box<Self>) {
        self.closed = true;
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.total_closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        if !self.closed {
            self.leaks.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Recognizer whose `open` outcomes are scripted by the test
#[derive(Default)]
pub struct FakeRecognizer {
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
    leaks: Arc<AtomicUsize>,
    script: Mutex<VecDeque<Result<(), UpstreamError>>>,
    streams: Mutex<Vec<FakeStream>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeRecognizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Outcome of the next unscripted `open` calls, in order
    pub fn script_open(&self, outcome: Result<(), UpstreamError>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Make subsequent `open` calls wait for [`release_opens`](Self::release_opens)
    pub fn hold_opens(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_opens(&self, count: usize) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(count);
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Handles dropped without being closed
    pub fn leaks(&self) -> usize {
        self.leaks.load(Ordering::SeqCst)
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    pub fn stream(&self, index: usize) -> FakeStream {
        self.streams.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl RecognizerAdapter for FakeRecognizer {
    async fn open(&self, _audio: &AudioConfig) -> Result<UpstreamStream, UpstreamError> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        outcome?;

        let (events_tx, events_rx) = mpsc::channel(64);
        let stream = FakeStream {
            events: events_tx,
            written: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        };
        self.streams.lock().unwrap().push(stream.clone());

        Ok(UpstreamStream {
            handle: Box::new(FakeHandle {
                written: stream.written,
                closes: stream.closes,
                total_closes: Arc::clone(&self.closes),
                leaks: Arc::clone(&self.leaks),
                closed: false,
            }),
            events: events_rx,
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met within 2s");
}

pub fn frame(n: u8) -> Vec<u8> {
    vec![n; 32]
}
