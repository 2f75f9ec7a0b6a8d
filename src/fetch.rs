use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DownloaderConfig;
use crate::error::PipelineError;

/// Video fetcher wrapping an external command-line downloader (yt-dlp
/// by default). Single attempt, fail-fast: a non-zero exit surfaces
/// the tool's stderr in the error.
#[derive(Debug, Clone)]
pub struct VideoFetcher {
    binary: PathBuf,
    format: String,
}

impl VideoFetcher {
    pub fn new(config: &DownloaderConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            format: config.format.clone(),
        }
    }

    /// Download the video at `url` into `scratch_dir` and return the
    /// path of the downloaded file.
    pub async fn fetch(&self, url: &str, scratch_dir: &Path) -> Result<PathBuf, PipelineError> {
        if url.trim().is_empty() {
            return Err(PipelineError::Download {
                stderr: "empty video URL".to_string(),
            });
        }

        let output_path = scratch_dir.join(format!("{}.mp4", Uuid::new_v4()));

        info!("⬇️  Downloading video from URL: {}", url);

        let output = tokio::process::Command::new(&self.binary)
            .args([
                "-f",
                &self.format,
                url,
                "-o",
                &output_path.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| PipelineError::DownloaderSpawn {
                binary: self.binary.to_string_lossy().to_string(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("❌ Downloader exited with {}: {}", output.status, stderr);
            return Err(PipelineError::Download { stderr });
        }

        info!("✅ Video saved to: {}", output_path.display());
        Ok(output_path)
    }
}
