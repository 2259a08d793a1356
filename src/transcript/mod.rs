//! Client-facing transcript messages
//!
//! Recognizer responses are reduced to a single best transcript plus its
//! finality flag. Stateless: nothing is kept between responses.

mod messages;
mod select;

pub use messages::{ErrorKind, ErrorNotice, ServerMessage, TranscriptEvent};
pub use select::select_transcript;
