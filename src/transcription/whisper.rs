use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::TranscriptionConfig;

/// Time-aligned transcript fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: u32,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
}

/// Complete transcription and language-ID result.
///
/// `language_confidence` is 0-100, rounded to two decimals. A value
/// of 0 with language "unknown" marks the degraded fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub language: String,
    pub language_confidence: f64,
    pub segments: Vec<TranscriptSegment>,
}

impl TranscriptionResult {
    /// The deliberate fallback produced when any internal step fails.
    pub fn degraded() -> Self {
        Self {
            text: String::new(),
            language: "unknown".to_string(),
            language_confidence: 0.0,
            segments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WhisperBackend {
    /// whisper.cpp via the `whisper-cli` binary
    WhisperCli,
    /// whisper.cpp via the older `whisper-cpp` binary
    WhisperCpp,
    /// Python OpenAI Whisper (fallback)
    Python,
}

impl WhisperBackend {
    fn command(&self) -> &'static str {
        match self {
            WhisperBackend::WhisperCli => "whisper-cli",
            WhisperBackend::WhisperCpp => "whisper-cpp",
            WhisperBackend::Python => "whisper",
        }
    }
}

/// Transcription and language-ID service wrapping a Whisper CLI
/// backend. The backend probe runs once at construction; each call
/// spawns one transcription process.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    model: String,
    model_dir: PathBuf,
    language_hint: Option<String>,
    backend: WhisperBackend,
}

impl WhisperTranscriber {
    /// Detect an available backend and build the service.
    pub async fn new(config: &TranscriptionConfig) -> Result<Self> {
        let backends = [
            WhisperBackend::WhisperCli,
            WhisperBackend::WhisperCpp,
            WhisperBackend::Python,
        ];

        for backend in backends {
            if Self::check_command_available(backend.command()).await {
                info!("✅ Using Whisper backend: {}", backend.command());
                return Ok(Self {
                    model: config.model.clone(),
                    model_dir: config.model_dir.clone(),
                    language_hint: config.language_hint.clone(),
                    backend,
                });
            }
            debug!("{} not available", backend.command());
        }

        Err(anyhow!(
            "No Whisper backend found. Please install whisper.cpp or openai-whisper"
        ))
    }

    /// Transcribe `audio_path`, detecting the spoken language.
    ///
    /// Never fails: any internal error degrades to an empty transcript
    /// with language "unknown" and zero confidence.
    pub async fn transcribe(&self, audio_path: &Path) -> TranscriptionResult {
        match self.run_backend(audio_path).await {
            Ok(result) => {
                info!(
                    "🎤 Transcribed {} ({} chars, language {} at {:.2}%)",
                    audio_path.display(),
                    result.text.len(),
                    result.language,
                    result.language_confidence
                );
                result
            }
            Err(e) => {
                warn!("Transcription failed, returning degraded result: {}", e);
                TranscriptionResult::degraded()
            }
        }
    }

    async fn run_backend(&self, audio_path: &Path) -> Result<TranscriptionResult> {
        if !audio_path.is_file() {
            return Err(anyhow!("audio file does not exist: {}", audio_path.display()));
        }

        let output_dir = tempfile::TempDir::new()?;
        match self.backend {
            WhisperBackend::WhisperCli | WhisperBackend::WhisperCpp => {
                self.run_whisper_cpp(audio_path, output_dir.path()).await
            }
            WhisperBackend::Python => self.run_python_whisper(audio_path, output_dir.path()).await,
        }
    }

    /// whisper.cpp: JSON output plus an `auto-detected language` line
    /// on stderr carrying the language probability.
    async fn run_whisper_cpp(
        &self,
        audio_path: &Path,
        output_dir: &Path,
    ) -> Result<TranscriptionResult> {
        let output_base = output_dir.join("transcript");

        let mut cmd = Command::new(self.backend.command());
        cmd.arg("-f")
            .arg(audio_path)
            .arg("-oj") // JSON output
            .arg("-of")
            .arg(&output_base)
            .arg("-t")
            .arg("4");

        let model_path = self.model_dir.join(format!("ggml-{}.bin", self.model));
        if model_path.exists() {
            cmd.arg("-m").arg(&model_path);
        } else {
            warn!("⚠️  Model file not found: {}, using backend default", model_path.display());
        }

        match &self.language_hint {
            Some(language) => cmd.arg("-l").arg(language),
            None => cmd.arg("-l").arg("auto"),
        };

        debug!("Executing command: {:?}", cmd);
        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.backend.command(),
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detected = parse_detected_language(&stderr);

        let json_path = output_base.with_extension("json");
        let json_content = tokio::fs::read_to_string(&json_path).await?;
        let whisper_output: WhisperOutput = serde_json::from_str(&json_content)?;

        Ok(assemble_result(whisper_output, detected))
    }

    /// Python OpenAI Whisper: JSON output named after the input file.
    /// Its stderr carries only the language name, not a probability,
    /// so the confidence degrades to 0 under the fallback policy.
    async fn run_python_whisper(
        &self,
        audio_path: &Path,
        output_dir: &Path,
    ) -> Result<TranscriptionResult> {
        let mut cmd = Command::new(self.backend.command());
        cmd.arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--output_format")
            .arg("json")
            .arg("--verbose")
            .arg("False")
            .arg("--fp16")
            .arg("False")
            .arg("--temperature")
            .arg("0.0");

        if let Some(language) = &self.language_hint {
            cmd.arg("--language").arg(language);
        }

        debug!("Executing command: {:?}", cmd);
        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(anyhow!(
                "whisper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detected = parse_detected_language(&stderr);

        let json_path = self.find_json_output(output_dir).await?;
        let json_content = tokio::fs::read_to_string(&json_path).await?;
        let whisper_output: WhisperOutput = serde_json::from_str(&json_content)?;

        Ok(assemble_result(whisper_output, detected))
    }

    async fn find_json_output(&self, dir: &Path) -> Result<PathBuf> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                return Ok(path);
            }
        }
        Err(anyhow!("no JSON output found in {}", dir.display()))
    }

    async fn check_command_available(cmd_name: &str) -> bool {
        Command::new(cmd_name)
            .arg("--help")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

/// Extract language code and probability from backend diagnostics.
///
/// whisper.cpp prints `auto-detected language: en (p = 0.958724)`.
fn parse_detected_language(stderr: &str) -> Option<(String, f64)> {
    let re = Regex::new(r"auto-detected language:\s*([a-z]{2,3})\s*\(p\s*=\s*([0-9.]+)\)")
        .expect("static regex");
    let caps = re.captures(stderr)?;
    let language = caps.get(1)?.as_str().to_string();
    let probability: f64 = caps.get(2)?.as_str().parse().ok()?;
    Some((language, round2(probability * 100.0)))
}

/// Merge the parsed JSON payload with the stderr language detection.
fn assemble_result(
    output: WhisperOutput,
    detected: Option<(String, f64)>,
) -> TranscriptionResult {
    let (segments, full_text, json_language) = if !output.transcription.is_empty() {
        // whisper.cpp format: transcription array with string timestamps
        let segments: Vec<TranscriptSegment> = output
            .transcription
            .into_iter()
            .enumerate()
            .map(|(i, seg)| TranscriptSegment {
                id: i as u32,
                start: parse_timestamp(&seg.timestamps.from).unwrap_or(0.0),
                end: parse_timestamp(&seg.timestamps.to).unwrap_or(0.0),
                text: seg.text.trim().to_string(),
            })
            .collect();

        let full_text = segments
            .iter()
            .map(|seg| seg.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let language = output.result.map(|r| r.language).or(output.language);
        (segments, full_text, language)
    } else {
        // Python whisper / legacy format: numeric segment bounds
        let segments: Vec<TranscriptSegment> = output
            .segments
            .into_iter()
            .enumerate()
            .map(|(i, seg)| TranscriptSegment {
                id: i as u32,
                start: seg.start,
                end: seg.end,
                text: seg.text.trim().to_string(),
            })
            .collect();

        let full_text = output.text.unwrap_or_else(|| {
            segments
                .iter()
                .map(|seg| seg.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        });

        (segments, full_text.trim().to_string(), output.language)
    };

    let (language, language_confidence) = match detected {
        Some((language, confidence)) => (language, confidence),
        None => (json_language.unwrap_or_else(|| "unknown".to_string()), 0.0),
    };

    TranscriptionResult {
        text: full_text,
        language,
        language_confidence,
        segments,
    }
}

/// Parse a "HH:MM:SS,mmm" timestamp into seconds.
fn parse_timestamp(timestamp: &str) -> Result<f64> {
    let parts: Vec<&str> = timestamp.split(',').collect();
    if parts.len() != 2 {
        return Err(anyhow!("invalid timestamp format: {}", timestamp));
    }

    let milliseconds: f64 = parts[1].parse::<f64>()? / 1000.0;

    let time_components: Vec<&str> = parts[0].split(':').collect();
    if time_components.len() != 3 {
        return Err(anyhow!("invalid time format: {}", parts[0]));
    }

    let hours: f64 = time_components[0].parse()?;
    let minutes: f64 = time_components[1].parse()?;
    let seconds: f64 = time_components[2].parse()?;

    Ok(hours * 3600.0 + minutes * 60.0 + seconds + milliseconds)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whisper JSON output, covering whisper.cpp and Python layouts.
#[derive(Debug, Clone, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    transcription: Vec<WhisperTranscriptionSegment>,
    #[serde(default)]
    result: Option<WhisperResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperResult {
    language: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperTranscriptionSegment {
    timestamps: WhisperTimestamps,
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperTimestamps {
    from: String,
    to: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}
