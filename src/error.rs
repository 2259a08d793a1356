use serde::Serialize;
use thiserror::Error;

/// The only distinction the session makes about upstream failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Expected to clear by opening a fresh stream (idle / audio timeout)
    Transient,
    /// Retrying cannot help (configuration, credentials, malformed request)
    Fatal,
}

/// An upstream failure, already classified by the adapter
#[derive(Debug, Clone, Error)]
#[error("{class:?} upstream error: {message}")]
pub struct UpstreamError {
    pub class: ErrorClass,
    pub message: String,
}

impl UpstreamError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Fatal,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class == ErrorClass::Transient
    }
}

/// Why a session reached `Closed`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloseReason {
    #[error("client disconnected")]
    ClientDisconnect,

    #[error("fatal upstream error: {0}")]
    FatalUpstream(String),

    #[error("upstream recovery failed after {attempts} attempts: {last_error}")]
    RecoveryBudgetExceeded { attempts: u32, last_error: String },

    #[error("client could not keep up with the audio stream")]
    Backpressure,

    #[error("gateway shutting down")]
    Shutdown,
}
