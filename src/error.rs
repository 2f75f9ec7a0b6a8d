use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the individual pipeline stages.
///
/// The orchestrator is the single catch-all boundary: every one of
/// these is converted into a user-facing `Error` result there, so the
/// caller never sees a raw error value.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("video download failed: {stderr}")]
    Download { stderr: String },

    #[error("failed to launch downloader '{binary}': {source}")]
    DownloaderSpawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("audio extraction failed for {}: {stderr}", .path.display())]
    Extraction { path: PathBuf, stderr: String },

    #[error("accent prediction failed: {0}")]
    Prediction(String),

    #[error("model resolution failed for {name}: {reason}")]
    ModelResolve { name: String, reason: String },

    #[error("audio file error: {0}")]
    Audio(#[from] hound::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
