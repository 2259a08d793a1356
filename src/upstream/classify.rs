//! Provider status codes → transient / fatal
//!
//! The recognizer reports gRPC canonical status codes. Only failures that a
//! fresh stream can clear are transient; the audio-timeout / stream-limit
//! failure (`OUT_OF_RANGE`) is the one seen in practice.

use crate::error::{ErrorClass, UpstreamError};

pub const DEADLINE_EXCEEDED: i32 = 4;
pub const ABORTED: i32 = 10;
pub const OUT_OF_RANGE: i32 = 11;
pub const UNAVAILABLE: i32 = 14;

/// Classify an error status reported on an open stream
pub fn classify_status(code: i32, message: &str) -> ErrorClass {
    if message.contains("Audio Timeout") {
        return ErrorClass::Transient;
    }

    match code {
        OUT_OF_RANGE | DEADLINE_EXCEEDED | ABORTED | UNAVAILABLE => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

/// Classify an HTTP status returned while establishing the stream
pub fn classify_http_status(status: u16) -> ErrorClass {
    match status {
        401 | 403 => ErrorClass::Fatal,
        _ => ErrorClass::Transient,
    }
}

pub fn status_error(code: i32, message: &str) -> UpstreamError {
    UpstreamError {
        class: classify_status(code, message),
        message: format!("status {}: {}", code, message),
    }
}
