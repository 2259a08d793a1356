use crate::error::{CloseReason, UpstreamError};
use serde::Serialize;
use std::fmt;

/// Lifecycle of a transcription session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the first upstream stream
    Initializing,
    /// Audio flows straight to the upstream stream
    Streaming,
    /// Upstream failed transiently; a replacement is being opened
    Recovering,
    /// Terminal
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Initializing => "initializing",
            SessionState::Streaming => "streaming",
            SessionState::Recovering => "recovering",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Things that move the session between states
#[derive(Debug, Clone)]
pub enum Input {
    OpenSucceeded,
    OpenFailed(UpstreamError),
    UpstreamFailed(UpstreamError),
    Terminate(CloseReason),
}

/// Work the session runtime performs after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Issue a new `open` in the background
    OpenUpstream,
    /// Write buffered frames to the new stream, oldest first
    FlushPending,
    /// Close the current upstream stream, if there is one
    ReleaseUpstream,
    /// Enter the terminal state: notify the client if abnormal, then detach
    Close(CloseReason),
}

/// Pure transition function for one session.
///
/// Holds the state and the count of consecutive failed opens; owns no I/O.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    failed_opens: u32,
    max_open_attempts: u32,
}

impl SessionMachine {
    pub fn new(max_open_attempts: u32) -> Self {
        Self {
            state: SessionState::Initializing,
            failed_opens: 0,
            max_open_attempts: max_open_attempts.max(1),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn failed_opens(&self) -> u32 {
        self.failed_opens
    }

    /// Effects to run when the session starts
    pub fn start(&self) -> Vec<Effect> {
        match self.state {
            SessionState::Initializing => vec![Effect::OpenUpstream],
            _ => Vec::new(),
        }
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        use SessionState::*;

        match (self.state, input) {
            (Closed, _) => Vec::new(),

            (_, Input::Terminate(reason)) => self.close(reason),

            (Initializing | Recovering, Input::OpenSucceeded) => {
                self.failed_opens = 0;
                self.state = Streaming;
                vec![Effect::FlushPending]
            }

            (Initializing | Recovering, Input::OpenFailed(err)) => {
                if !err.is_transient() {
                    return self.close(CloseReason::FatalUpstream(err.message));
                }

                self.failed_opens += 1;
                if self.failed_opens >= self.max_open_attempts {
                    return self.close(CloseReason::RecoveryBudgetExceeded {
                        attempts: self.failed_opens,
                        last_error: err.message,
                    });
                }

                vec![Effect::OpenUpstream]
            }

            (Streaming, Input::UpstreamFailed(err)) => {
                if err.is_transient() {
                    self.state = Recovering;
                    vec![Effect::ReleaseUpstream, Effect::OpenUpstream]
                } else {
                    self.close(CloseReason::FatalUpstream(err.message))
                }
            }

            // Open results only arrive while waiting for one, and upstream
            // failures only from a live stream; anything else is stale.
            (_, Input::OpenSucceeded | Input::OpenFailed(_) | Input::UpstreamFailed(_)) => {
                Vec::new()
            }
        }
    }

    fn close(&mut self, reason: CloseReason) -> Vec<Effect> {
        self.state = SessionState::Closed;
        vec![Effect::ReleaseUpstream, Effect::Close(reason)]
    }
}
