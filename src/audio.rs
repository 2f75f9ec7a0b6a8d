use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AudioConfig;
use crate::error::PipelineError;
use crate::fetch::VideoFetcher;

/// A decoded waveform as stored on disk: interleaved samples plus the
/// channel layout and rate needed to interpret them.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl Waveform {
    /// Duration in seconds of the underlying audio.
    pub fn duration_secs(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.channels as f64 / self.sample_rate as f64
    }
}

/// Audio extractor converting a video's audio track to mono 16-bit
/// PCM WAV at the configured rate via ffmpeg.
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    pub target_sample_rate: u32,
}

impl AudioExtractor {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Extract the audio track of `video_path` into `output_dir`,
    /// returning the path of the written WAV file.
    pub async fn extract(
        &self,
        video_path: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let audio_path = output_dir.join(format!("{}.wav", Uuid::new_v4()));

        info!("🎵 Extracting audio from: {}", video_path.display());

        let output = tokio::process::Command::new("ffmpeg")
            .args([
                "-i",
                &video_path.to_string_lossy(),
                "-vn", // No video stream
                "-acodec",
                "pcm_s16le", // 16-bit PCM
                "-ar",
                &self.target_sample_rate.to_string(),
                "-ac",
                "1", // Mono channel
                "-f",
                "wav",
                "-y",
                &audio_path.to_string_lossy(),
            ])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PipelineError::Extraction {
                path: video_path.to_path_buf(),
                stderr,
            });
        }

        info!("✅ Audio saved to: {}", audio_path.display());
        Ok(audio_path)
    }
}

/// Front half of the pipeline: URL in, persistent WAV path out.
///
/// Download and extraction happen inside a scoped temp directory that
/// is removed on every exit path; only the final WAV, copied into the
/// samples directory, survives.
#[derive(Debug, Clone)]
pub struct MediaPipeline {
    fetcher: VideoFetcher,
    extractor: AudioExtractor,
    samples_dir: PathBuf,
    max_retained_samples: usize,
}

impl MediaPipeline {
    pub fn new(fetcher: VideoFetcher, config: &AudioConfig) -> Self {
        Self {
            fetcher,
            extractor: AudioExtractor::new(config.target_sample_rate),
            samples_dir: config.samples_dir.clone(),
            max_retained_samples: config.max_retained_samples,
        }
    }

    /// Download `url`, extract its audio, and copy the WAV into the
    /// samples directory. Returns the absolute path of the copy.
    pub async fn process_url(&self, url: &str) -> Result<PathBuf, PipelineError> {
        // Scratch dir lifetime covers download and extraction; dropped
        // (and deleted) on success and on every failure return below.
        let scratch = tempfile::TempDir::new()?;

        let video_path = self.fetcher.fetch(url, scratch.path()).await?;
        let audio_path = self.extractor.extract(&video_path, scratch.path()).await?;

        tokio::fs::create_dir_all(&self.samples_dir).await?;
        let final_path = self.samples_dir.join(format!("{}.wav", Uuid::new_v4()));
        tokio::fs::copy(&audio_path, &final_path).await?;

        self.evict_old_samples().await;

        let final_path = tokio::fs::canonicalize(&final_path).await?;
        info!("💾 Final audio path: {}", final_path.display());
        Ok(final_path)
    }

    /// Drop the oldest WAVs beyond the retention limit. Best-effort:
    /// eviction problems are logged, never fatal to the request.
    async fn evict_old_samples(&self) {
        if self.max_retained_samples == 0 {
            return;
        }

        let mut entries = match tokio::fs::read_dir(&self.samples_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot scan samples dir for eviction: {}", e);
                return;
            }
        };

        let mut wavs: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "wav") {
                if let Ok(meta) = entry.metadata().await {
                    let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                    wavs.push((modified, path));
                }
            }
        }

        if wavs.len() <= self.max_retained_samples {
            return;
        }

        wavs.sort_by_key(|(modified, _)| *modified);
        let excess = wavs.len() - self.max_retained_samples;
        for (_, path) in wavs.into_iter().take(excess) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("🧹 Evicted old sample: {}", path.display()),
                Err(e) => warn!("Failed to evict {}: {}", path.display(), e),
            }
        }
    }
}

/// Load a WAV file into memory as f32 samples.
pub fn load_waveform(path: &Path) -> Result<Waveform, PipelineError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(Waveform {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DownloaderConfig;
    use tempfile::TempDir;

    fn write_test_wav(path: &Path, samples: &[i16], sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn failing_pipeline(samples_dir: PathBuf) -> MediaPipeline {
        let fetcher = VideoFetcher::new(&DownloaderConfig {
            binary: PathBuf::from("false"),
            format: "mp4".to_string(),
        });
        MediaPipeline::new(
            fetcher,
            &AudioConfig {
                target_sample_rate: 16000,
                samples_dir,
                max_retained_samples: 4,
            },
        )
    }

    #[test]
    fn test_load_waveform_reads_spec_and_samples() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        write_test_wav(&path, &[0, 16384, -16384, 32767], 16000);

        let waveform = load_waveform(&path).unwrap();
        assert_eq!(waveform.sample_rate, 16000);
        assert_eq!(waveform.channels, 1);
        assert_eq!(waveform.samples.len(), 4);
        assert!((waveform.samples[1] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_waveform_duration() {
        let waveform = Waveform {
            samples: vec![0.0; 32000],
            channels: 1,
            sample_rate: 16000,
        };
        assert!((waveform.duration_secs() - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_samples() {
        let tmp = TempDir::new().unwrap();
        let samples_dir = tmp.path().join("samples");
        let pipeline = failing_pipeline(samples_dir.clone());

        let result = pipeline.process_url("https://example.com/clip.mp4").await;
        assert!(result.is_err());

        // Samples dir is only created on success; nothing may leak.
        assert!(!samples_dir.exists() || samples_dir.read_dir().unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_eviction_keeps_newest_samples() {
        let tmp = TempDir::new().unwrap();
        let samples_dir = tmp.path().to_path_buf();
        let pipeline = failing_pipeline(samples_dir.clone());

        for i in 0..6 {
            let path = samples_dir.join(format!("sample_{}.wav", i));
            write_test_wav(&path, &[0; 16], 16000);
            // Distinct mtimes so eviction order is deterministic
            let mtime = std::time::SystemTime::UNIX_EPOCH
                + std::time::Duration::from_secs(1_000_000 + i * 60);
            let file = std::fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(mtime).unwrap();
        }

        pipeline.evict_old_samples().await;

        let mut remaining: Vec<String> = samples_dir
            .read_dir()
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "sample_2.wav".to_string(),
                "sample_3.wav".to_string(),
                "sample_4.wav".to_string(),
                "sample_5.wav".to_string(),
            ]
        );
    }
}
