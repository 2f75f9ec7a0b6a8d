use anyhow::{anyhow, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Linear classification head mapping a speaker embedding to accent
/// logits.
///
/// Fitted weights load from JSON; absent that, `seeded` produces a
/// deterministic unfitted initialization. An unfitted head is a stub:
/// its outputs carry no accent signal and the classifier logs a
/// warning when one is in use.
#[derive(Debug, Clone)]
pub struct ClassifierHead {
    /// (categories, embedding_dim)
    weights: Array2<f32>,
    bias: Array1<f32>,
}

/// On-disk JSON layout for fitted head weights.
#[derive(Debug, Serialize, Deserialize)]
struct HeadWeights {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl ClassifierHead {
    pub fn from_json_file(path: &Path, categories: usize, input_dim: usize) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("cannot read head weights {}: {}", path.display(), e))?;
        let raw: HeadWeights = serde_json::from_str(&content)
            .map_err(|e| anyhow!("cannot parse head weights {}: {}", path.display(), e))?;

        if raw.weights.len() != categories || raw.bias.len() != categories {
            return Err(anyhow!(
                "head weights {} have {} rows, expected {}",
                path.display(),
                raw.weights.len(),
                categories
            ));
        }
        if raw.weights.iter().any(|row| row.len() != input_dim) {
            return Err(anyhow!(
                "head weights {} row width mismatch, expected {}",
                path.display(),
                input_dim
            ));
        }

        let flat: Vec<f32> = raw.weights.into_iter().flatten().collect();
        Ok(Self {
            weights: Array2::from_shape_vec((categories, input_dim), flat)?,
            bias: Array1::from_vec(raw.bias),
        })
    }

    /// Deterministic Xavier-style initialization from a fixed seed.
    /// Unfitted by construction; see module docs.
    pub fn seeded(categories: usize, input_dim: usize, seed: u64) -> Self {
        let bound = (6.0 / (categories + input_dim) as f32).sqrt();
        let mut state = seed.max(1);
        let mut next_uniform = move || {
            // xorshift64*
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            let r = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
            let unit = (r >> 11) as f32 / (1u64 << 53) as f32;
            (unit * 2.0 - 1.0) * bound
        };

        let weights =
            Array2::from_shape_fn((categories, input_dim), |_| next_uniform());
        let bias = Array1::zeros(categories);

        Self { weights, bias }
    }

    pub fn categories(&self) -> usize {
        self.weights.nrows()
    }

    pub fn input_dim(&self) -> usize {
        self.weights.ncols()
    }

    /// Logits for a single embedding.
    pub fn forward(&self, embedding: &Array1<f32>) -> Array1<f32> {
        self.weights.dot(embedding) + &self.bias
    }
}

/// Standard max-shifted softmax.
pub fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    let exp: Array1<f32> = logits.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    #[test]
    fn test_seeded_head_is_deterministic() {
        let a = ClassifierHead::seeded(7, 192, 42);
        let b = ClassifierHead::seeded(7, 192, 42);
        assert_eq!(a.weights, b.weights);

        let c = ClassifierHead::seeded(7, 192, 43);
        assert_ne!(a.weights, c.weights);
    }

    #[test]
    fn test_forward_shape() {
        let head = ClassifierHead::seeded(7, 192, 1);
        let embedding = Array1::from_vec(vec![0.1; 192]);
        let logits = head.forward(&embedding);
        assert_eq!(logits.len(), 7);
    }

    #[test]
    fn test_forward_known_weights() {
        let head = ClassifierHead {
            weights: Array2::from_shape_vec((2, 3), vec![1.0, 0.0, 0.0, 0.0, 2.0, 0.0]).unwrap(),
            bias: Array1::from_vec(vec![0.5, -0.5]),
        };
        let logits = head.forward(&Array1::from_vec(vec![1.0, 1.0, 1.0]));
        assert_relative_eq!(logits[0], 1.5, epsilon = 1e-6);
        assert_relative_eq!(logits[1], 1.5, epsilon = 1e-6);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let logits = Array1::from_vec(vec![2.0, -1.0, 0.5, 3.0, 0.0, -2.0, 1.0]);
        let probs = softmax(&logits);
        assert_relative_eq!(probs.sum(), 1.0, epsilon = 1e-6);
        assert!(probs.iter().all(|&p| p > 0.0));
    }

    #[test]
    fn test_softmax_argmax_preserved() {
        let logits = Array1::from_vec(vec![0.1, 5.0, -1.0]);
        let probs = softmax(&logits);
        assert!(probs[1] > probs[0] && probs[1] > probs[2]);
    }

    #[test]
    fn test_json_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("head.json");
        let raw = HeadWeights {
            weights: vec![vec![0.1, 0.2], vec![0.3, 0.4], vec![0.5, 0.6]],
            bias: vec![0.0, 0.1, 0.2],
        };
        std::fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        let head = ClassifierHead::from_json_file(&path, 3, 2).unwrap();
        assert_eq!(head.categories(), 3);
        assert_eq!(head.input_dim(), 2);

        let logits = head.forward(&Array1::from_vec(vec![1.0, 0.0]));
        assert_relative_eq!(logits[2], 0.7, epsilon = 1e-6);
    }

    #[test]
    fn test_json_shape_mismatch_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("head.json");
        let raw = HeadWeights {
            weights: vec![vec![0.1, 0.2]],
            bias: vec![0.0],
        };
        std::fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        assert!(ClassifierHead::from_json_file(&path, 7, 2).is_err());
    }
}
