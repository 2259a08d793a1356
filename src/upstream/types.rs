use serde::{Deserialize, Serialize};

/// One streaming response from the recognizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeResponse {
    #[serde(default)]
    pub results: Vec<RecognitionResult>,
}

/// A recognized span of audio with ranked alternatives (best first)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    #[serde(default)]
    pub alternatives: Vec<RecognitionAlternative>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionAlternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl RecognizeResponse {
    /// Convenience constructor for a single-alternative response
    pub fn single(transcript: impl Into<String>, is_final: bool) -> Self {
        Self {
            results: vec![RecognitionResult {
                alternatives: vec![RecognitionAlternative {
                    transcript: transcript.into(),
                    confidence: None,
                }],
                is_final,
                stability: None,
            }],
        }
    }
}
