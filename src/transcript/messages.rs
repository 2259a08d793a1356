use crate::error::CloseReason;
use serde::{Deserialize, Serialize};

/// A transcript fragment as delivered to the client:
/// `{ "transcript": <string>, "isFinal": <boolean> }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEvent {
    pub transcript: String,
    pub is_final: bool,
}

/// Terminal error notification, sent at most once per session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FatalUpstream,
    RecoveryBudgetExceeded,
}

impl ErrorNotice {
    /// Notice for an abnormal closure; `None` for closures the client is not told about
    pub fn for_close(reason: &CloseReason) -> Option<Self> {
        let kind = match reason {
            CloseReason::FatalUpstream(_) => ErrorKind::FatalUpstream,
            CloseReason::RecoveryBudgetExceeded { .. } => ErrorKind::RecoveryBudgetExceeded,
            _ => return None,
        };
        Some(Self {
            kind,
            message: reason.to_string(),
        })
    }
}

/// Everything the gateway sends to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Transcript(TranscriptEvent),
    Error { error: ErrorNotice },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_wire_format() {
        let msg = ServerMessage::Transcript(TranscriptEvent {
            transcript: "hello".to_string(),
            is_final: true,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"transcript":"hello","isFinal":true}"#);
    }

    #[test]
    fn test_error_wire_format() {
        let reason = CloseReason::RecoveryBudgetExceeded {
            attempts: 3,
            last_error: "connection refused".to_string(),
        };
        let msg = ServerMessage::Error {
            error: ErrorNotice::for_close(&reason).unwrap(),
        };

        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["error"]["kind"], "recovery_budget_exceeded");
        assert_eq!(
            json["error"]["message"],
            "upstream recovery failed after 3 attempts: connection refused"
        );

        let parsed: ServerMessage = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_normal_closures_are_silent() {
        assert!(ErrorNotice::for_close(&CloseReason::ClientDisconnect).is_none());
        assert!(ErrorNotice::for_close(&CloseReason::Shutdown).is_none());
        assert!(ErrorNotice::for_close(&CloseReason::Backpressure).is_none());
        assert_eq!(
            ErrorNotice::for_close(&CloseReason::FatalUpstream("denied".to_string()))
                .map(|n| n.kind),
            Some(ErrorKind::FatalUpstream)
        );
    }
}
