use super::messages::TranscriptEvent;
use crate::upstream::RecognizeResponse;

/// Reduce a recognizer response to the client wire form.
///
/// Takes the first result and its top-ranked alternative. Responses without
/// any alternative (e.g. endpointing notifications) produce nothing.
pub fn select_transcript(response: &RecognizeResponse) -> Option<TranscriptEvent> {
    let result = response.results.first()?;
    let best = result.alternatives.first()?;

    Some(TranscriptEvent {
        transcript: best.transcript.clone(),
        is_final: result.is_final,
    })
}
