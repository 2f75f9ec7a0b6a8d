/// Accent Analyzer
///
/// Pipeline that downloads a public video, extracts its audio track,
/// and runs pretrained speech models to report the spoken language, a
/// transcript, and a coarse English-accent classification.
pub mod accent;
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod report;
pub mod transcription;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for easy access
pub use crate::accent::{AccentClassifier, AccentLabel, AccentPrediction};
pub use crate::analysis::{AccentAnalyzer, AnalysisOutcome, AnalysisResult};
pub use crate::audio::{AudioExtractor, MediaPipeline, Waveform};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::PipelineError;
pub use crate::fetch::VideoFetcher;
pub use crate::transcription::{TranscriptionResult, WhisperTranscriber};
