//! Optional statistical classifiers behind a uniform interface.
//!
//! Two independently trained linear text classifiers, each paired with its
//! vectorizer, exported as JSON by the offline training pipeline:
//! a binary "should we run analytics" model and a multi-class "which
//! function" model (trained over all classes including a sentinel "none").
//!
//! Loading is all-or-nothing: if any of the four artifacts fails to load,
//! the whole bundle is unavailable and the engine runs heuristics only.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{EngineError, EngineResult};

/// Neutral confidence when the underlying model cannot produce a
/// probability.
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

pub const PERFORM_MODEL_FILE: &str = "perform_model.json";
pub const PERFORM_VECTORIZER_FILE: &str = "perform_vectorizer.json";
pub const LABEL_MODEL_FILE: &str = "label_model.json";
pub const LABEL_VECTORIZER_FILE: &str = "label_vectorizer.json";

/// Bag-of-words vectorizer: vocabulary index plus optional idf weights.
#[derive(Debug, Clone, Deserialize)]
pub struct Vectorizer {
    pub vocabulary: HashMap<String, usize>,
    #[serde(default)]
    pub idf: Option<Vec<f64>>,
}

impl Vectorizer {
    /// Sparse feature vector for a text: (vocabulary index, weight).
    pub fn transform(&self, text: &str) -> Vec<(usize, f64)> {
        let lower = text.to_lowercase();
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= 2)
        {
            if let Some(&index) = self.vocabulary.get(token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut features: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, count)| {
                let weight = match &self.idf {
                    Some(idf) => count * idf.get(index).copied().unwrap_or(1.0),
                    None => count,
                };
                (index, weight)
            })
            .collect();
        features.sort_by_key(|(index, _)| *index);
        features
    }
}

/// Linear model weights: one coefficient row per class (a single row for
/// binary models), as exported from the training pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub classes: Vec<String>,
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LinearModel {
    fn decision(&self, row: usize, features: &[(usize, f64)]) -> f64 {
        let bias = self.intercept.get(row).copied().unwrap_or(0.0);
        let dot: f64 = match self.coef.get(row) {
            Some(weights) => features
                .iter()
                .map(|(index, value)| weights.get(*index).copied().unwrap_or(0.0) * value)
                .sum(),
            None => 0.0,
        };
        bias + dot
    }

    /// Binary prediction with the probability of the predicted side.
    pub fn predict_binary(&self, features: &[(usize, f64)]) -> (bool, f64) {
        if self.coef.is_empty() && self.intercept.is_empty() {
            return (false, NEUTRAL_CONFIDENCE);
        }
        let z = self.decision(0, features);
        let p = sigmoid(z);
        if !p.is_finite() {
            return (false, NEUTRAL_CONFIDENCE);
        }
        if p >= 0.5 {
            (true, p.clamp(0.0, 1.0))
        } else {
            (false, (1.0 - p).clamp(0.0, 1.0))
        }
    }

    /// Multi-class prediction via softmax over per-class scores.
    pub fn predict_class(&self, features: &[(usize, f64)]) -> (String, f64) {
        if self.classes.is_empty() {
            return (String::new(), NEUTRAL_CONFIDENCE);
        }

        let scores: Vec<f64> = (0..self.classes.len())
            .map(|row| self.decision(row, features))
            .collect();

        // Stable softmax.
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let denom: f64 = exps.iter().sum();

        let (best, _) = scores
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.total_cmp(b).then(ib.cmp(ia)))
            .unwrap_or((0, &0.0));

        let probability = if denom.is_finite() && denom > 0.0 {
            (exps[best] / denom).clamp(0.0, 1.0)
        } else {
            NEUTRAL_CONFIDENCE
        };

        (self.classes[best].clone(), probability)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// The two models and their vectorizers, loaded once at startup and
/// immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct ClassifierBundle {
    perform_model: LinearModel,
    perform_vectorizer: Vectorizer,
    label_model: LinearModel,
    label_vectorizer: Vectorizer,
}

impl ClassifierBundle {
    /// Load all four artifacts from a directory. Any failure makes the
    /// whole bundle unavailable — partial loading is not a valid state.
    pub fn load(dir: &Path) -> EngineResult<Self> {
        Ok(Self {
            perform_model: load_artifact(&dir.join(PERFORM_MODEL_FILE))?,
            perform_vectorizer: load_artifact(&dir.join(PERFORM_VECTORIZER_FILE))?,
            label_model: load_artifact(&dir.join(LABEL_MODEL_FILE))?,
            label_vectorizer: load_artifact(&dir.join(LABEL_VECTORIZER_FILE))?,
        })
    }

    /// Assemble a bundle from already-loaded parts (tests, custom wiring).
    pub fn from_parts(
        perform_model: LinearModel,
        perform_vectorizer: Vectorizer,
        label_model: LinearModel,
        label_vectorizer: Vectorizer,
    ) -> Self {
        Self {
            perform_model,
            perform_vectorizer,
            label_model,
            label_vectorizer,
        }
    }

    /// Should this question run analytics at all?
    pub fn predict_perform(&self, question: &str) -> (bool, f64) {
        let features = self.perform_vectorizer.transform(question);
        self.perform_model.predict_binary(&features)
    }

    /// Which function should handle it? Only meaningful on the
    /// perform=true branch; may return the sentinel "none" class.
    pub fn predict_label(&self, question: &str) -> (String, f64) {
        let features = self.label_vectorizer.transform(question);
        self.label_model.predict_class(&features)
    }
}

fn load_artifact<T: DeserializeOwned>(path: &Path) -> EngineResult<T> {
    let contents = std::fs::read_to_string(path).map_err(|e| EngineError::Artifact {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&contents).map_err(|e| EngineError::Artifact {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
