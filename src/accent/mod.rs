pub mod head;
pub mod preprocess;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::audio::Waveform;
use crate::error::PipelineError;
use head::{softmax, ClassifierHead};

/// Closed set of accent categories plus the low-confidence sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccentLabel {
    Us,
    Uk,
    Australia,
    Canada,
    India,
    African,
    Others,
    Uncertain,
}

impl AccentLabel {
    /// The seven real categories, in classification-head output order.
    pub const CATEGORIES: [AccentLabel; 7] = [
        AccentLabel::Us,
        AccentLabel::Uk,
        AccentLabel::Australia,
        AccentLabel::Canada,
        AccentLabel::India,
        AccentLabel::African,
        AccentLabel::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccentLabel::Us => "US",
            AccentLabel::Uk => "UK",
            AccentLabel::Australia => "Australia",
            AccentLabel::Canada => "Canada",
            AccentLabel::India => "India",
            AccentLabel::African => "African",
            AccentLabel::Others => "Others",
            AccentLabel::Uncertain => "Uncertain",
        }
    }
}

impl std::fmt::Display for AccentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accent classification: top label, its confidence (0-100), and
/// the full per-category distribution (values sum to ~100).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccentPrediction {
    pub label: AccentLabel,
    pub confidence: f64,
    pub scores: BTreeMap<String, f64>,
}

/// Accent classifier: pretrained speaker-embedding encoder (ONNX)
/// feeding a linear classification head.
pub struct AccentClassifier {
    session: Mutex<ort::session::Session>,
    head: ClassifierHead,
    confidence_threshold: f64,
}

impl AccentClassifier {
    /// Build the classifier around an encoder model file. The session
    /// is expensive; construct once per process and share.
    pub fn new(
        model_path: &Path,
        head: ClassifierHead,
        confidence_threshold: f64,
    ) -> anyhow::Result<Self> {
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_inter_threads(1)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        info!(
            "🧠 Loaded speaker-embedding model: {} ({} categories, {}-dim head)",
            model_path.display(),
            head.categories(),
            head.input_dim()
        );

        Ok(Self {
            session: Mutex::new(session),
            head,
            confidence_threshold,
        })
    }

    /// Classify a waveform's accent. Preprocessing and inference
    /// failures surface as `PredictionFailure`; no retry.
    pub fn predict(&self, waveform: &Waveform) -> Result<AccentPrediction, PipelineError> {
        let processed =
            preprocess::preprocess(&waveform.samples, waveform.channels, waveform.sample_rate);

        let embedding = self.embed(&processed)?;
        let logits = self.head.forward(&embedding);
        let probs = softmax(&logits);

        let prediction = classify_probs(probs.as_slice().unwrap_or(&[]), self.confidence_threshold);
        info!(
            "🗣️  Predicted accent: {} ({:.2}%)",
            prediction.label, prediction.confidence
        );
        Ok(prediction)
    }

    fn embed(&self, samples: &[f32]) -> Result<Array1<f32>, PipelineError> {
        let tensor = Array2::from_shape_vec((1, samples.len()), samples.to_vec())
            .map_err(|e| PipelineError::Prediction(e.to_string()))?;
        let input_value = ort::value::Tensor::from_array(tensor)
            .map_err(|e| PipelineError::Prediction(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| PipelineError::Prediction(format!("session lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| PipelineError::Prediction(e.to_string()))?;

        let embedding_array = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| PipelineError::Prediction(e.to_string()))?;
        let embedding: Vec<f32> = embedding_array.iter().copied().collect();

        if embedding.len() != self.head.input_dim() {
            return Err(PipelineError::Prediction(format!(
                "encoder produced {}-dim embedding, head expects {}",
                embedding.len(),
                self.head.input_dim()
            )));
        }

        Ok(Array1::from_vec(embedding))
    }
}

/// Build a labelled prediction from a probability vector, applying
/// the low-confidence override: below the threshold the reported
/// label becomes `Uncertain` while the confidence value stays.
pub fn classify_probs(probs: &[f32], confidence_threshold: f64) -> AccentPrediction {
    let mut scores = BTreeMap::new();
    let mut top_idx = 0usize;
    let mut top_prob = f32::NEG_INFINITY;

    for (i, label) in AccentLabel::CATEGORIES.iter().enumerate() {
        let p = probs.get(i).copied().unwrap_or(0.0);
        scores.insert(label.as_str().to_string(), round2(p as f64 * 100.0));
        if p > top_prob {
            top_prob = p;
            top_idx = i;
        }
    }

    let confidence = round2(top_prob.max(0.0) as f64 * 100.0);
    let label = if confidence < confidence_threshold {
        warn!(
            "Low confidence prediction ({:.2}% < {:.2}%)",
            confidence, confidence_threshold
        );
        AccentLabel::Uncertain
    } else {
        AccentLabel::CATEGORIES[top_idx]
    };

    AccentPrediction {
        label,
        confidence,
        scores,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seven_categories() {
        assert_eq!(AccentLabel::CATEGORIES.len(), 7);
        assert_eq!(AccentLabel::Us.as_str(), "US");
        assert_eq!(AccentLabel::Uncertain.as_str(), "Uncertain");
    }

    #[test]
    fn test_confident_prediction_keeps_argmax() {
        let probs = [0.7, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05];
        let prediction = classify_probs(&probs, 40.0);
        assert_eq!(prediction.label, AccentLabel::Us);
        assert_eq!(prediction.confidence, 70.0);
    }

    #[test]
    fn test_low_confidence_forces_uncertain() {
        // Argmax is India at 30%, below the 40% threshold
        let probs = [0.1, 0.1, 0.1, 0.15, 0.3, 0.15, 0.1];
        let prediction = classify_probs(&probs, 40.0);
        assert_eq!(prediction.label, AccentLabel::Uncertain);
        // Raw confidence is still reported
        assert_eq!(prediction.confidence, 30.0);
    }

    #[test]
    fn test_distribution_sums_to_hundred() {
        let probs = [0.21, 0.13, 0.08, 0.17, 0.11, 0.19, 0.11];
        let prediction = classify_probs(&probs, 40.0);
        assert_eq!(prediction.scores.len(), 7);
        let total: f64 = prediction.scores.values().sum();
        assert!((total - 100.0).abs() < 0.1, "total was {}", total);
    }

    #[test]
    fn test_scores_cover_all_categories() {
        let probs = [0.5, 0.1, 0.1, 0.1, 0.1, 0.05, 0.05];
        let prediction = classify_probs(&probs, 40.0);
        for label in AccentLabel::CATEGORIES {
            assert!(prediction.scores.contains_key(label.as_str()));
        }
    }

    #[test]
    fn test_exact_threshold_is_not_uncertain() {
        let probs = [0.4, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1];
        let prediction = classify_probs(&probs, 40.0);
        assert_eq!(prediction.label, AccentLabel::Us);
    }
}
