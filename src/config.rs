use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the accent analyzer pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External video downloader settings
    pub downloader: DownloaderConfig,

    /// Audio extraction settings
    pub audio: AudioConfig,

    /// Transcription and language-ID settings
    pub transcription: TranscriptionConfig,

    /// Accent classifier settings
    pub classifier: ClassifierConfig,

    /// HTTP API settings
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Downloader executable, resolved on PATH unless absolute
    pub binary: PathBuf,

    /// Format selector passed to the downloader (`-f`)
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate for extracted audio
    pub target_sample_rate: u32,

    /// Semi-persistent directory extracted WAVs are copied into
    pub samples_dir: PathBuf,

    /// Maximum number of WAVs retained in the samples directory,
    /// oldest evicted first (0 = keep everything)
    pub max_retained_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Whisper model name (tiny, base, small, ...)
    pub model: String,

    /// Directory holding ggml model files for whisper.cpp backends
    pub model_dir: PathBuf,

    /// Language hint; None enables auto-detection
    pub language_hint: Option<String>,

    /// Language code required for accent classification to run
    pub required_language: String,

    /// Minimum language-detection confidence (0-100) for the gate
    pub min_language_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Directory holding downloaded model weights
    pub model_dir: PathBuf,

    /// Speaker-embedding model filename within `model_dir`
    pub embedding_model_file: String,

    /// Remote URL the embedding model is fetched from when absent
    pub embedding_model_url: String,

    /// Embedding width produced by the encoder
    pub embedding_dim: usize,

    /// Optional JSON file with fitted classification-head weights.
    /// When absent the head falls back to a seeded, unfitted
    /// initialization and says so at startup.
    pub head_weights_file: Option<PathBuf>,

    /// Predictions below this confidence (0-100) report "Uncertain"
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port the HTTP API binds to
    pub port: u16,
}

impl Config {
    /// Load configuration from the first readable file in the search
    /// path, falling back to environment overrides on defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "accent-analyzer.toml",
            "config/accent-analyzer.toml",
            "~/.config/accent-analyzer/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load a specific configuration file.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("cannot read config {}: {}", path.display(), e))?;
        let config = toml::from_str(&config_str)
            .map_err(|e| anyhow!("cannot parse config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Defaults with environment-variable overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(binary) = std::env::var("ACCENT_ANALYZER_DOWNLOADER") {
            config.downloader.binary = PathBuf::from(binary);
        }

        if let Ok(samples_dir) = std::env::var("ACCENT_ANALYZER_SAMPLES_DIR") {
            config.audio.samples_dir = PathBuf::from(samples_dir);
        }

        if let Ok(model) = std::env::var("ACCENT_ANALYZER_WHISPER_MODEL") {
            config.transcription.model = model;
        }

        if let Ok(model_dir) = std::env::var("ACCENT_ANALYZER_MODEL_DIR") {
            config.classifier.model_dir = PathBuf::from(&model_dir);
            config.transcription.model_dir = PathBuf::from(model_dir);
        }

        if let Ok(port) = std::env::var("ACCENT_ANALYZER_PORT") {
            config.server.port = port.parse().unwrap_or(config.server.port);
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.audio.target_sample_rate == 0 {
            return Err(anyhow!("target_sample_rate must be greater than 0"));
        }

        if self.downloader.format.is_empty() {
            return Err(anyhow!("downloader format selector must not be empty"));
        }

        if !(0.0..=100.0).contains(&self.classifier.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within 0-100"));
        }

        if !(0.0..=100.0).contains(&self.transcription.min_language_confidence) {
            return Err(anyhow!("min_language_confidence must be within 0-100"));
        }

        if self.classifier.embedding_dim == 0 {
            return Err(anyhow!("embedding_dim must be greater than 0"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            downloader: DownloaderConfig {
                binary: PathBuf::from("yt-dlp"),
                format: "mp4".to_string(),
            },
            audio: AudioConfig {
                target_sample_rate: 16000, // Optimal for Whisper and the encoder
                samples_dir: PathBuf::from("samples"),
                max_retained_samples: 32,
            },
            transcription: TranscriptionConfig {
                model: "base".to_string(),
                model_dir: PathBuf::from("models"),
                language_hint: None,
                required_language: "en".to_string(),
                min_language_confidence: 80.0,
            },
            classifier: ClassifierConfig {
                model_dir: PathBuf::from("models"),
                embedding_model_file: "speaker_embedding_ecapa.onnx".to_string(),
                embedding_model_url:
                    "https://huggingface.co/speechbrain/spkrec-ecapa-voxceleb/resolve/main/embedding_model.onnx"
                        .to_string(),
                embedding_dim: 192, // ECAPA-TDNN embedding width
                head_weights_file: None,
                confidence_threshold: 40.0,
            },
            server: ServerConfig { port: 8080 },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_downloader(mut self, binary: PathBuf) -> Self {
        self.config.downloader.binary = binary;
        self
    }

    pub fn with_samples_dir(mut self, dir: PathBuf) -> Self {
        self.config.audio.samples_dir = dir;
        self
    }

    pub fn with_whisper_model(mut self, model: String) -> Self {
        self.config.transcription.model = model;
        self
    }

    pub fn with_model_dir(mut self, dir: PathBuf) -> Self {
        self.config.classifier.model_dir = dir.clone();
        self.config.transcription.model_dir = dir;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.classifier.confidence_threshold = threshold;
        self
    }

    pub fn with_max_retained_samples(mut self, max: usize) -> Self {
        self.config.audio.max_retained_samples = max;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.target_sample_rate, 16000);
        assert_eq!(config.transcription.required_language, "en");
        assert_eq!(config.transcription.min_language_confidence, 80.0);
        assert_eq!(config.classifier.confidence_threshold, 40.0);
        assert_eq!(config.classifier.embedding_dim, 192);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_downloader(PathBuf::from("/opt/yt-dlp/yt-dlp"))
            .with_whisper_model("tiny".to_string())
            .with_confidence_threshold(55.0)
            .build();

        assert_eq!(config.downloader.binary, PathBuf::from("/opt/yt-dlp/yt-dlp"));
        assert_eq!(config.transcription.model, "tiny");
        assert_eq!(config.classifier.confidence_threshold, 55.0);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_bad_threshold() {
        let config = ConfigBuilder::new().with_confidence_threshold(140.0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.audio.target_sample_rate, config.audio.target_sample_rate);
        assert_eq!(parsed.downloader.format, config.downloader.format);
    }
}
