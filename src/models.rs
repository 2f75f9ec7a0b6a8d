use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::PipelineError;

/// Resolve a model weight file: the local model directory wins, else
/// the file is downloaded from `url` into it.
///
/// Downloads go to a `.part` file first and are renamed once complete,
/// so an interrupted fetch never leaves a half-written model behind.
pub async fn resolve_model(dir: &Path, name: &str, url: &str) -> Result<PathBuf, PipelineError> {
    let target = dir.join(name);
    if target.exists() {
        debug!("Model already present: {}", target.display());
        return Ok(target);
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| resolve_err(name, format!("cannot create {}: {}", dir.display(), e)))?;

    info!("⬇️  Downloading model {} from {}", name, url);
    download(url, &target)
        .await
        .map_err(|reason| resolve_err(name, reason))?;

    info!("✅ Model downloaded: {}", target.display());
    Ok(target)
}

async fn download(url: &str, dest: &Path) -> Result<(), String> {
    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| format!("request failed: {e}"))?;

    let total = response.content_length().unwrap_or(0);
    let temp_path = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .map_err(|e| format!("cannot create {}: {}", temp_path.display(), e))?;

    let mut downloaded: u64 = 0;
    let mut last_logged_pct: u64 = 0;
    let mut response = response;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| format!("download interrupted: {e}"))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("write failed: {e}"))?;
        downloaded += chunk.len() as u64;

        if total > 0 {
            let pct = downloaded * 100 / total;
            if pct >= last_logged_pct + 10 {
                info!("📦 Download progress: {}% ({}/{} bytes)", pct, downloaded, total);
                last_logged_pct = pct;
            }
        }
    }

    file.flush().await.map_err(|e| format!("flush failed: {e}"))?;
    drop(file);

    tokio::fs::rename(&temp_path, dest)
        .await
        .map_err(|e| format!("cannot finalize {}: {}", dest.display(), e))?;

    Ok(())
}

fn resolve_err(name: &str, reason: String) -> PipelineError {
    PipelineError::ModelResolve {
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_finds_existing_file() {
        tokio_test::block_on(async {
            let tmp = TempDir::new().unwrap();
            let path = tmp.path().join("model.onnx");
            tokio::fs::write(&path, b"weights").await.unwrap();

            let resolved = resolve_model(tmp.path(), "model.onnx", "http://invalid.example/model")
                .await
                .unwrap();
            assert_eq!(resolved, path);
        });
    }

    #[tokio::test]
    async fn test_resolve_unreachable_url_fails_cleanly() {
        let tmp = TempDir::new().unwrap();

        let result = resolve_model(
            tmp.path(),
            "model.onnx",
            "http://invalid.nonexistent.example.com/model",
        )
        .await;

        assert!(matches!(result, Err(PipelineError::ModelResolve { .. })));
        // No partial file may survive a failed download
        assert!(!tmp.path().join("model.onnx").exists());
        assert!(!tmp.path().join("model.part").exists());
    }
}
