//! Decision types returned by the intent-routing engine.

use serde::{Deserialize, Serialize};

/// Which heuristic or signal source produced a candidate's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateReason {
    PatternMatch,
    NameOverlap,
    DescriptionOverlap,
    MlPrediction,
    Heuristic,
}

/// A scored, named suggestion for which analytics function best matches
/// a question. Ephemeral — produced per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    /// Match score in [0, 1].
    pub score: f64,
    pub reason: CandidateReason,
}

/// Final routing decision for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the question requires a numeric analytics function at all.
    pub perform_analytics: bool,
    /// Name of the selected function. Always `None` when
    /// `perform_analytics` is false.
    pub analytics: Option<String>,
    /// Decision confidence in [0, 1].
    pub confidence: f64,
    /// Top-N candidates, sorted by score descending, ties by name
    /// ascending. Kept for observability; may be empty.
    pub candidates: Vec<Candidate>,
}

impl Decision {
    /// Terminal decision for a metadata-only question: no analytics,
    /// full confidence, no candidates.
    pub fn metadata_only() -> Self {
        Self {
            perform_analytics: false,
            analytics: None,
            confidence: 1.0,
            candidates: Vec::new(),
        }
    }

    /// Structural invariants every decision must satisfy.
    pub fn is_well_formed(&self) -> bool {
        if !self.perform_analytics && self.analytics.is_some() {
            return false;
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return false;
        }
        for pair in self.candidates.windows(2) {
            let ordered = pair[1].score < pair[0].score
                || (pair[1].score == pair[0].score && pair[0].name < pair[1].name);
            if !ordered {
                return false;
            }
        }
        let mut names = std::collections::HashSet::new();
        self.candidates.iter().all(|c| names.insert(c.name.as_str()))
    }
}

/// Body of `POST /decide`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideRequest {
    pub question: String,
    /// Maximum number of candidates to return (default 3).
    #[serde(default)]
    pub top_n: Option<usize>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// Functions in the currently cached registry snapshot. Zero means no
    /// snapshot was ever obtained (startup fetch failed and no refresh
    /// has succeeded since).
    pub registry_count: usize,
}
