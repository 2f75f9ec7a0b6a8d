use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::accent::head::ClassifierHead;
use crate::accent::{AccentClassifier, AccentLabel, AccentPrediction};
use crate::audio::{load_waveform, MediaPipeline};
use crate::config::Config;
use crate::error::PipelineError;
use crate::fetch::VideoFetcher;
use crate::models::resolve_model;
use crate::transcription::{TranscriptionResult, WhisperTranscriber};

const HEAD_INIT_SEED: u64 = 0x5EED_ACCE;

/// Which way an analysis ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisOutcome {
    Success,
    NonEnglishOrUnclear,
    Error,
}

impl Default for AnalysisOutcome {
    fn default() -> Self {
        AnalysisOutcome::Error
    }
}

/// Final payload handed to the presentation layer. Field names match
/// the UI contract; `outcome` is for programmatic consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(skip)]
    pub outcome: AnalysisOutcome,
    pub accent: String,
    pub confidence: f64,
    pub language: String,
    pub language_score: f64,
    pub transcript: String,
    pub all_scores: BTreeMap<String, f64>,
    pub summary: String,
}

impl AnalysisResult {
    fn success(transcription: &TranscriptionResult, prediction: AccentPrediction) -> Self {
        let scores_text = prediction
            .scores
            .iter()
            .map(|(k, v)| format!("{}: {:.1}%", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        let summary = format!(
            "The speaker is using a {} English accent with {}% confidence.\nAll accent scores: {}",
            prediction.label, prediction.confidence, scores_text
        );

        Self {
            outcome: AnalysisOutcome::Success,
            accent: prediction.label.as_str().to_string(),
            confidence: prediction.confidence,
            language: transcription.language.clone(),
            language_score: transcription.language_confidence,
            transcript: transcription.text.clone(),
            all_scores: prediction.scores,
            summary,
        }
    }

    fn non_english(transcription: &TranscriptionResult) -> Self {
        Self {
            outcome: AnalysisOutcome::NonEnglishOrUnclear,
            accent: "Non-English or unclear".to_string(),
            confidence: 0.0,
            language: transcription.language.clone(),
            language_score: transcription.language_confidence,
            transcript: transcription.text.clone(),
            all_scores: BTreeMap::new(),
            summary: "The language detected is not English or is unclear.".to_string(),
        }
    }

    fn failure(message: &str) -> Self {
        Self {
            outcome: AnalysisOutcome::Error,
            accent: "Error".to_string(),
            confidence: 0.0,
            language: "unknown".to_string(),
            language_score: 0.0,
            transcript: message.to_string(),
            all_scores: BTreeMap::new(),
            summary: format!("An error occurred during analysis: {}", message),
        }
    }
}

/// `true` when the detected language clears the English-only gate.
pub fn passes_language_gate(
    language: &str,
    confidence: f64,
    required_language: &str,
    min_confidence: f64,
) -> bool {
    language == required_language && confidence >= min_confidence
}

/// Analysis orchestrator: sequences download, extraction,
/// transcription, the English-only gate, and accent classification.
///
/// Both models load once here and are shared read-only for the
/// process lifetime; `analyze` itself never returns an error.
pub struct AccentAnalyzer {
    config: Config,
    media: MediaPipeline,
    transcriber: WhisperTranscriber,
    classifier: AccentClassifier,
}

impl AccentAnalyzer {
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let transcriber = WhisperTranscriber::new(&config.transcription).await?;

        let model_path = resolve_model(
            &config.classifier.model_dir,
            &config.classifier.embedding_model_file,
            &config.classifier.embedding_model_url,
        )
        .await?;

        let categories = AccentLabel::CATEGORIES.len();
        let head = match &config.classifier.head_weights_file {
            Some(path) => {
                info!("📊 Loading fitted classification head: {}", path.display());
                ClassifierHead::from_json_file(path, categories, config.classifier.embedding_dim)?
            }
            None => {
                warn!(
                    "⚠️  No fitted head weights configured; using an unfitted seeded \
                     initialization. Accent scores will not be meaningful."
                );
                ClassifierHead::seeded(categories, config.classifier.embedding_dim, HEAD_INIT_SEED)
            }
        };

        let classifier = AccentClassifier::new(
            &model_path,
            head,
            config.classifier.confidence_threshold,
        )?;

        let fetcher = VideoFetcher::new(&config.downloader);
        let media = MediaPipeline::new(fetcher, &config.audio);

        Ok(Self {
            config,
            media,
            transcriber,
            classifier,
        })
    }

    /// Run the full pipeline for one URL. Every internal error is
    /// converted into the `Error` result variant; callers never see a
    /// raw error.
    pub async fn analyze(&self, url: &str) -> AnalysisResult {
        match self.run_pipeline(url).await {
            Ok(result) => result,
            Err(e) => {
                error!("Error in accent analysis: {}", e);
                AnalysisResult::failure(&e.to_string())
            }
        }
    }

    async fn run_pipeline(&self, url: &str) -> Result<AnalysisResult, PipelineError> {
        // 1. Download and extract audio
        let audio_path = self.media.process_url(url).await?;

        // 2. Transcribe and detect language (degrades, never fails)
        let transcription = self.transcriber.transcribe(&audio_path).await;

        // 3. English-only gate
        if !passes_language_gate(
            &transcription.language,
            transcription.language_confidence,
            &self.config.transcription.required_language,
            self.config.transcription.min_language_confidence,
        ) {
            info!(
                "🌐 Language gate rejected '{}' at {:.2}%",
                transcription.language, transcription.language_confidence
            );
            return Ok(AnalysisResult::non_english(&transcription));
        }

        // 4. Reload the extracted audio and classify the accent
        let waveform = load_waveform(&audio_path)?;
        let prediction = self.classifier.predict(&waveform)?;

        // 5. Assemble
        Ok(AnalysisResult::success(&transcription, prediction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn english_transcription(language: &str, confidence: f64) -> TranscriptionResult {
        TranscriptionResult {
            text: "Hello there.".to_string(),
            language: language.to_string(),
            language_confidence: confidence,
            segments: Vec::new(),
        }
    }

    #[test]
    fn test_gate_accepts_confident_english() {
        assert!(passes_language_gate("en", 95.2, "en", 80.0));
        assert!(passes_language_gate("en", 80.0, "en", 80.0));
    }

    #[test]
    fn test_gate_rejects_other_languages() {
        assert!(!passes_language_gate("fr", 99.0, "en", 80.0));
        assert!(!passes_language_gate("unknown", 0.0, "en", 80.0));
    }

    #[test]
    fn test_gate_rejects_unclear_english() {
        assert!(!passes_language_gate("en", 79.99, "en", 80.0));
    }

    #[test]
    fn test_non_english_result_has_empty_scores() {
        let transcription = english_transcription("fr", 97.3);
        let result = AnalysisResult::non_english(&transcription);

        assert_eq!(result.outcome, AnalysisOutcome::NonEnglishOrUnclear);
        assert_eq!(result.language, "fr");
        assert_eq!(result.accent, "Non-English or unclear");
        assert_eq!(result.confidence, 0.0);
        assert!(result.all_scores.is_empty());
    }

    #[test]
    fn test_error_result_carries_message() {
        let result = AnalysisResult::failure("video download failed: 403 Forbidden");

        assert_eq!(result.outcome, AnalysisOutcome::Error);
        assert_eq!(result.accent, "Error");
        assert_eq!(result.transcript, "video download failed: 403 Forbidden");
        assert!(result.summary.contains("403 Forbidden"));
        assert!(result.all_scores.is_empty());
    }

    #[test]
    fn test_success_result_summary_lists_all_scores() {
        let transcription = english_transcription("en", 95.0);
        let prediction = crate::accent::classify_probs(
            &[0.6, 0.1, 0.05, 0.05, 0.1, 0.05, 0.05],
            40.0,
        );
        let result = AnalysisResult::success(&transcription, prediction);

        assert_eq!(result.outcome, AnalysisOutcome::Success);
        assert_eq!(result.accent, "US");
        assert_eq!(result.all_scores.len(), 7);
        assert!(result.summary.contains("US English accent"));
        assert!(result.summary.contains("All accent scores:"));
        assert!(result.summary.contains("UK:"));
    }

    #[test]
    fn test_result_serializes_ui_contract_keys() {
        let result = AnalysisResult::failure("boom");
        let value = serde_json::to_value(&result).unwrap();
        let object = value.as_object().unwrap();

        for key in [
            "accent",
            "confidence",
            "language",
            "language_score",
            "transcript",
            "all_scores",
            "summary",
        ] {
            assert!(object.contains_key(key), "missing key {}", key);
        }
        assert!(!object.contains_key("outcome"));
    }
}
