pub mod whisper;

pub use whisper::{TranscriptSegment, TranscriptionResult, WhisperTranscriber};
