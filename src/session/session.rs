use super::buffer::PendingAudio;
use super::config::SessionConfig;
use super::state::{Effect, Input, SessionMachine, SessionState};
use super::stats::{SessionCounters, SessionStats};
use crate::config::BackpressurePolicy;
use crate::error::{CloseReason, UpstreamError};
use crate::transcript::{select_transcript, ErrorNotice, ServerMessage};
use crate::upstream::{
    RecognizeResponse, RecognizerAdapter, UpstreamEvent, UpstreamHandle, UpstreamStream,
};
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc::error::{SendError, TrySendError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Everything the session actor reacts to, in arrival order
enum SessionEvent {
    Audio(Vec<u8>),
    Opened {
        generation: u64,
        result: Result<UpstreamStream, UpstreamError>,
    },
    Upstream {
        generation: u64,
        event: UpstreamEvent,
    },
}

/// Handle to one client's transcription session.
///
/// The session itself runs as a single task that processes one event at a
/// time; this handle only enqueues. Cloning is cheap.
#[derive(Clone)]
pub struct Session {
    id: Uuid,
    events: mpsc::Sender<SessionEvent>,
    control: mpsc::UnboundedSender<CloseReason>,
    state: watch::Receiver<SessionState>,
    counters: Arc<SessionCounters>,
    backpressure: BackpressurePolicy,
}

impl Session {
    /// Start a session that pushes transcripts to `outbound`.
    ///
    /// The returned task resolves with the reason the session closed.
    pub fn spawn(
        adapter: Arc<dyn RecognizerAdapter>,
        config: SessionConfig,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> (Self, JoinHandle<CloseReason>) {
        let id = Uuid::new_v4();
        let (events_tx, events_rx) = mpsc::channel(config.inbound_queue.max(1));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Initializing);
        let counters = Arc::new(SessionCounters::new());

        let session = Self {
            id,
            events: events_tx.clone(),
            control: control_tx,
            state: state_rx,
            counters: Arc::clone(&counters),
            backpressure: config.backpressure,
        };

        let actor = SessionActor {
            id,
            machine: SessionMachine::new(config.max_open_attempts),
            pending: PendingAudio::new(config.pending_capacity_bytes),
            config,
            adapter,
            upstream: None,
            forwarder: None,
            generation: 0,
            events_tx,
            events: events_rx,
            control: control_rx,
            outbound: Some(outbound),
            state_tx,
            counters,
        };

        (session, tokio::spawn(actor.run()))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot(self.id, self.state())
    }

    /// Hand an inbound audio frame to the session. Never waits.
    pub fn ingest_audio(&self, frame: Vec<u8>) {
        match self.events.try_send(SessionEvent::Audio(frame)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => match self.backpressure {
                BackpressurePolicy::ShedAudio => {
                    let total = self.counters.dropped(1);
                    if total == 1 || total % 100 == 0 {
                        warn!(
                            session_id = %self.id,
                            dropped_total = total,
                            "Session queue full, shedding inbound audio"
                        );
                    }
                }
                BackpressurePolicy::Disconnect => {
                    warn!(session_id = %self.id, "Session queue full, disconnecting client");
                    self.close(CloseReason::Backpressure);
                }
            },
            // Session already finished
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Client went away. Idempotent.
    pub fn terminate(&self) {
        self.close(CloseReason::ClientDisconnect);
    }

    /// Ask the session to close for `reason`. Ignored once closed.
    pub fn close(&self, reason: CloseReason) {
        let _ = self.control.send(reason);
    }

    /// Wait until the session reaches `state`; `false` if it finished without doing so
    pub async fn wait_for_state(&self, state: SessionState) -> bool {
        let mut rx = self.state.clone();
        let reached = rx.wait_for(|current| *current == state).await.is_ok();
        reached
    }

    pub async fn closed(&self) {
        self.wait_for_state(SessionState::Closed).await;
    }
}

struct SessionActor {
    id: Uuid,
    config: SessionConfig,
    adapter: Arc<dyn RecognizerAdapter>,
    machine: SessionMachine,
    pending: PendingAudio,

    /// The only valid upstream stream, if any
    upstream: Option<Box<dyn UpstreamHandle>>,
    forwarder: Option<JoinHandle<()>>,

    /// Bumped on every open; events tagged with an older value are stale
    generation: u64,

    events_tx: mpsc::Sender<SessionEvent>,
    events: mpsc::Receiver<SessionEvent>,
    control: mpsc::UnboundedReceiver<CloseReason>,

    /// Dropped on close, which detaches the session from the client
    outbound: Option<mpsc::Sender<ServerMessage>>,
    state_tx: watch::Sender<SessionState>,
    counters: Arc<SessionCounters>,
}

impl SessionActor {
    async fn run(mut self) -> CloseReason {
        info!(
            session_id = %self.id,
            adapter = self.adapter.name(),
            sample_rate = self.config.audio.sample_rate_hertz,
            language = %self.config.audio.language_code,
            "Session started"
        );

        for effect in self.machine.start() {
            if effect == Effect::OpenUpstream {
                self.open_upstream();
            }
        }

        let reason = loop {
            let input = tokio::select! {
                biased;
                reason = self.control.recv() => {
                    Some(Input::Terminate(reason.unwrap_or(CloseReason::ClientDisconnect)))
                }
                Some(event) = self.events.recv() => self.on_event(event).await,
            };

            if let Some(input) = input {
                if let Some(reason) = self.apply(input).await {
                    break reason;
                }
            }
        };

        self.drain_mailbox();
        reason
    }

    async fn on_event(&mut self, event: SessionEvent) -> Option<Input> {
        match event {
            SessionEvent::Audio(frame) => self.ingest(frame),

            SessionEvent::Opened { generation, result } => {
                if generation != self.generation {
                    if let Ok(stream) = result {
                        stream.handle.close();
                    }
                    return None;
                }

                match result {
                    Ok(stream) => {
                        self.install(stream);
                        Some(Input::OpenSucceeded)
                    }
                    Err(err) => {
                        warn!(session_id = %self.id, error = %err, "Failed to open upstream stream");
                        Some(Input::OpenFailed(err))
                    }
                }
            }

            SessionEvent::Upstream { generation, event } => {
                if generation != self.generation || self.upstream.is_none() {
                    return None;
                }

                match event {
                    UpstreamEvent::Response(response) => self.deliver(&response).await,
                    UpstreamEvent::Error(err) => {
                        warn!(session_id = %self.id, error = %err, "Upstream stream failed");
                        Some(Input::UpstreamFailed(err))
                    }
                }
            }
        }
    }

    /// Run one input through the state machine and perform its effects.
    /// Returns the close reason once the session reaches `Closed`.
    async fn apply(&mut self, input: Input) -> Option<CloseReason> {
        let mut inputs = VecDeque::from([input]);
        let mut closed = None;

        while let Some(input) = inputs.pop_front() {
            let before = self.machine.state();
            let effects = self.machine.handle(input);
            let after = self.machine.state();

            if before != after {
                info!(session_id = %self.id, from = %before, to = %after, "Session state changed");
                if before == SessionState::Recovering && after == SessionState::Streaming {
                    self.counters.recoveries.fetch_add(1, Ordering::Relaxed);
                }
            }

            for effect in effects {
                match effect {
                    Effect::OpenUpstream => self.open_upstream(),
                    Effect::FlushPending => {
                        if let Some(next) = self.flush_pending() {
                            inputs.push_back(next);
                        }
                    }
                    Effect::ReleaseUpstream => self.release_upstream(),
                    Effect::Close(reason) => {
                        self.finish(&reason).await;
                        closed = Some(reason);
                    }
                }
            }

            // Published after the effects so observers see a settled session
            self.state_tx.send_replace(after);
        }

        closed
    }

    fn ingest(&mut self, frame: Vec<u8>) -> Option<Input> {
        self.counters.touch();

        match self.machine.state() {
            SessionState::Streaming => self.write_upstream(frame).err().map(Input::UpstreamFailed),
            SessionState::Initializing | SessionState::Recovering => {
                let dropped = self.pending.push(frame);
                if dropped > 0 {
                    let total = self.counters.dropped(dropped);
                    warn!(
                        session_id = %self.id,
                        dropped,
                        dropped_total = total,
                        "Pending audio buffer full, dropped oldest frames"
                    );
                }
                None
            }
            SessionState::Closed => None,
        }
    }

    fn write_upstream(&mut self, frame: Vec<u8>) -> Result<(), UpstreamError> {
        let Some(handle) = self.upstream.as_mut() else {
            return Ok(());
        };

        let len = frame.len();
        handle.write(frame)?;
        self.counters.forwarded(len);
        Ok(())
    }

    fn flush_pending(&mut self) -> Option<Input> {
        let frames: Vec<Vec<u8>> = self.pending.drain().collect();
        if !frames.is_empty() {
            debug!(session_id = %self.id, frames = frames.len(), "Flushing pending audio");
        }

        for frame in frames {
            if let Err(err) = self.write_upstream(frame) {
                return Some(Input::UpstreamFailed(err));
            }
        }

        None
    }

    fn open_upstream(&mut self) {
        self.generation += 1;

        let generation = self.generation;
        let adapter = Arc::clone(&self.adapter);
        let audio = self.config.audio.clone();
        let events = self.events_tx.clone();
        let session_id = self.id;

        debug!(session_id = %session_id, generation, "Opening upstream stream");

        tokio::spawn(async move {
            let result = adapter.open(&audio).await;

            if let Err(SendError(SessionEvent::Opened {
                result: Ok(stream), ..
            })) = events.send(SessionEvent::Opened { generation, result }).await
            {
                debug!(session_id = %session_id, "Session ended before upstream opened, releasing");
                stream.handle.close();
            }
        });
    }

    fn install(&mut self, stream: UpstreamStream) {
        let UpstreamStream { handle, mut events } = stream;
        let generation = self.generation;
        let session_events = self.events_tx.clone();

        self.counters.upstream_opens.fetch_add(1, Ordering::Relaxed);

        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if session_events
                    .send(SessionEvent::Upstream { generation, event })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));
        self.upstream = Some(handle);
    }

    fn release_upstream(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(handle) = self.upstream.take() {
            debug!(session_id = %self.id, generation = self.generation, "Releasing upstream stream");
            handle.close();
        }
    }

    /// Push one transcript to the client. A close request that arrives
    /// while the outbound queue is full wins over the pending send.
    async fn deliver(&mut self, response: &RecognizeResponse) -> Option<Input> {
        let event = select_transcript(response)?;
        let outbound = self.outbound.as_ref()?;

        tokio::select! {
            biased;
            reason = self.control.recv() => {
                debug!(session_id = %self.id, "Close requested while client was not reading");
                Some(Input::Terminate(reason.unwrap_or(CloseReason::ClientDisconnect)))
            }
            sent = outbound.send(ServerMessage::Transcript(event)) => {
                if sent.is_ok() {
                    self.counters
                        .transcripts_delivered
                        .fetch_add(1, Ordering::Relaxed);
                } else {
                    debug!(session_id = %self.id, "Client gone, transcript not delivered");
                }
                None
            }
        }
    }

    async fn finish(&mut self, reason: &CloseReason) {
        if let Some(outbound) = self.outbound.take() {
            if let Some(notice) = ErrorNotice::for_close(reason) {
                tokio::select! {
                    biased;
                    _ = self.control.recv() => {
                        debug!(session_id = %self.id, "Close requested, error notice abandoned");
                    }
                    _ = outbound.send(ServerMessage::Error { error: notice }) => {}
                }
            }
        }

        let stats = self.counters.snapshot(self.id, SessionState::Closed);
        match reason {
            CloseReason::ClientDisconnect | CloseReason::Shutdown => info!(
                session_id = %self.id,
                reason = %reason,
                frames_forwarded = stats.frames_forwarded,
                transcripts = stats.transcripts_delivered,
                recoveries = stats.recoveries,
                "Session closed"
            ),
            CloseReason::Backpressure => {
                warn!(session_id = %self.id, reason = %reason, "Session closed")
            }
            CloseReason::FatalUpstream(_) | CloseReason::RecoveryBudgetExceeded { .. } => {
                error!(session_id = %self.id, reason = %reason, "Session closed")
            }
        }
    }

    /// Stop accepting events and release any stream opened too late
    fn drain_mailbox(&mut self) {
        self.events.close();
        while let Ok(event) = self.events.try_recv() {
            if let SessionEvent::Opened {
                result: Ok(stream), ..
            } = event
            {
                stream.handle.close();
            }
        }
    }
}
