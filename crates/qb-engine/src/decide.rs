//! The decision merger — reconciles the override detector, the candidate
//! scorer, and the optional classifier bundle into one deterministic,
//! explainable decision per question.
//!
//! Not a persistent state machine: a one-shot pipeline with
//! short-circuits. No step may fail for ordinary inputs; empty questions,
//! empty registries, and missing classifiers all have defined fallbacks.

use qb_protocol::{Candidate, CandidateReason, Decision};
use regex::Regex;
use std::sync::LazyLock;

use crate::cache::RegistryCache;
use crate::classifier::ClassifierBundle;
use crate::overrides;
use crate::registry::RegistrySnapshot;
use crate::scorer;

/// A top candidate at or above this score flips a negative ML perform
/// vote: strong lexical evidence overrides a weak classifier.
pub const CUE_OVERRIDE_THRESHOLD: f64 = 0.75;
/// Confidence boost when the chosen label agrees with the top candidate.
pub const AGREEMENT_BOOST: f64 = 0.15;
/// The agreement boost only applies below this base confidence.
pub const BOOST_BELOW: f64 = 0.85;
/// The boosted confidence never exceeds this cap.
pub const BOOST_CAP: f64 = 0.95;
/// Score assigned to a synthetic candidate injected for the raw ML label.
pub const ML_SYNTHETIC_SCORE: f64 = 0.65;
/// Candidates returned when the caller does not specify top-N.
pub const DEFAULT_TOP_N: usize = 3;

/// Built-in label emitted when analytics is wanted but nothing more
/// specific matches.
const FALLBACK_LABEL: &str = "analyze_timeseries";

/// Coarse keyword → built-in label table for heuristic-only labeling.
/// Whole words are anchored on both sides so bare "max"/"min"/"sum" match
/// without firing inside unrelated words ("climax", "determine",
/// "assume"); stems stay open-ended to catch inflections ("anomalies",
/// "correlated").
static KEYWORD_LABELS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\b(average|mean)\b", "compute_average"),
        (r"\b(max|maximum|highest|peak)\b", "compute_max"),
        (r"\b(min|minimum|lowest)\b", "compute_min"),
        (r"\b(sum|total)\b", "compute_sum"),
        (r"\b(trend|forecast)", "analyze_trend"),
        (r"\b(anomal|deviat|outlier)", "detect_anomalies"),
        (r"\bcorrelat", "correlate_sensors"),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(pattern).unwrap(), label))
    .collect()
});

/// How decisions are made, fixed once at startup. Keeps the "is the
/// classifier loaded" check out of the per-request logic.
pub enum DecisionStrategy {
    MlBacked(ClassifierBundle),
    HeuristicOnly,
}

pub struct DecisionEngine {
    cache: RegistryCache,
    strategy: DecisionStrategy,
}

impl DecisionEngine {
    pub fn new(cache: RegistryCache, strategy: DecisionStrategy) -> Self {
        Self { cache, strategy }
    }

    /// Functions in the current snapshot, without triggering a refresh.
    pub async fn registry_count(&self) -> usize {
        self.cache.current().await.len()
    }

    /// Decide whether (and which) analytics function should handle a
    /// question. Never fails; every degradation yields a valid decision.
    pub async fn decide(&self, question: &str, top_n: Option<usize>) -> Decision {
        let top_n = top_n.unwrap_or(DEFAULT_TOP_N);

        // Step 1: metadata short-circuit. Terminal.
        if overrides::is_metadata_only(question) {
            tracing::debug!(question, "metadata-only question, bypassing analytics");
            return Decision::metadata_only();
        }

        // Step 2: candidate generation from the current snapshot.
        let snapshot = self.cache.get().await;
        let candidates = scorer::score_candidates(question, &snapshot, top_n);

        let decision = match &self.strategy {
            DecisionStrategy::HeuristicOnly => decide_heuristic(question, candidates),
            DecisionStrategy::MlBacked(bundle) => {
                decide_ml(bundle, question, &snapshot, candidates, top_n)
            }
        };

        tracing::debug!(
            question,
            perform = decision.perform_analytics,
            analytics = decision.analytics.as_deref().unwrap_or(""),
            confidence = decision.confidence,
            candidates = decision.candidates.len(),
            "decision made"
        );
        debug_assert!(decision.is_well_formed());
        decision
    }
}

/// No-classifier branch: the cue table from the override detector, read
/// inverted, plus a coarse keyword → label mapping.
fn decide_heuristic(question: &str, candidates: Vec<Candidate>) -> Decision {
    let lower = question.to_lowercase();
    let keyword_label = keyword_label(&lower);

    let perform =
        overrides::has_analytics_cue(&lower) || keyword_label.is_some() || !candidates.is_empty();

    if !perform {
        // Candidates are necessarily empty here.
        return Decision {
            perform_analytics: false,
            analytics: None,
            confidence: 1.0,
            candidates,
        };
    }

    let label = match keyword_label {
        Some(label) => label.to_string(),
        None => match candidates.first() {
            Some(top) => top.name.clone(),
            None => FALLBACK_LABEL.to_string(),
        },
    };

    let confidence = calibrate(Some(&label), &candidates, 0.5);
    Decision {
        perform_analytics: true,
        analytics: Some(label),
        confidence,
        candidates,
    }
}

/// Classifier branch: ML votes first, lexical evidence can both override a
/// negative vote and correct an out-of-registry label.
fn decide_ml(
    bundle: &ClassifierBundle,
    question: &str,
    snapshot: &RegistrySnapshot,
    mut candidates: Vec<Candidate>,
    top_n: usize,
) -> Decision {
    let (perform, perform_confidence) = bundle.predict_perform(question);

    if !perform {
        // Strong lexical/pattern evidence overrides a weak negative vote.
        if let Some(top) = candidates.first()
            && top.score >= CUE_OVERRIDE_THRESHOLD
        {
            let label = top.name.clone();
            tracing::debug!(label, score = top.score, "overriding negative ML perform vote");
            let confidence = calibrate(Some(&label), &candidates, perform_confidence);
            return Decision {
                perform_analytics: true,
                analytics: Some(label),
                confidence,
                candidates,
            };
        }

        let confidence = calibrate(None, &candidates, perform_confidence);
        return Decision {
            perform_analytics: false,
            analytics: None,
            confidence,
            candidates,
        };
    }

    let (raw_label, label_confidence) = bundle.predict_label(question);
    let label_known = snapshot.contains(&raw_label);

    // Surface the raw ML pick in the candidate list when the registry
    // knows it but no lexical heuristic scored it.
    if label_known && !candidates.iter().any(|c| c.name == raw_label) {
        candidates.push(Candidate {
            name: raw_label.clone(),
            score: ML_SYNTHETIC_SCORE,
            reason: CandidateReason::MlPrediction,
        });
        scorer::sort_candidates(&mut candidates);
        candidates.truncate(top_n);
    }

    // Never emit a label the registry doesn't know.
    let label = if label_known {
        raw_label
    } else if let Some(top) = candidates.first() {
        top.name.clone()
    } else {
        let lower = question.to_lowercase();
        keyword_label(&lower).unwrap_or(FALLBACK_LABEL).to_string()
    };

    let confidence = calibrate(Some(&label), &candidates, label_confidence);
    Decision {
        perform_analytics: true,
        analytics: Some(label),
        confidence,
        candidates,
    }
}

/// Step 5 confidence calibration: base on the top candidate's score when
/// candidates exist (else the supplied default), with a capped boost when
/// the chosen label and the top candidate agree.
fn calibrate(label: Option<&str>, candidates: &[Candidate], default_base: f64) -> f64 {
    let mut confidence = candidates
        .first()
        .map(|top| top.score)
        .unwrap_or(default_base);

    if let (Some(label), Some(top)) = (label, candidates.first())
        && label == top.name
        && confidence < BOOST_BELOW
    {
        confidence = (confidence + AGREEMENT_BOOST).min(BOOST_CAP);
    }

    confidence.clamp(0.0, 1.0)
}

fn keyword_label(lower_question: &str) -> Option<&'static str> {
    KEYWORD_LABELS
        .iter()
        .find(|(re, _)| re.is_match(lower_question))
        .map(|(_, label)| *label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{LinearModel, Vectorizer};
    use qb_protocol::{FunctionDescriptor, RegistryFeed};
    use std::collections::HashMap;

    fn snapshot(descriptors: Vec<(&str, &str, Vec<&str>)>) -> RegistrySnapshot {
        RegistrySnapshot::from_feed(RegistryFeed {
            count: descriptors.len(),
            functions: descriptors
                .into_iter()
                .map(|(name, description, patterns)| FunctionDescriptor {
                    name: name.into(),
                    description: description.into(),
                    patterns: patterns.into_iter().map(String::from).collect(),
                    parameters: serde_json::Value::Null,
                })
                .collect(),
        })
    }

    fn heuristic_engine(snap: RegistrySnapshot) -> DecisionEngine {
        DecisionEngine::new(
            RegistryCache::preloaded(snap),
            DecisionStrategy::HeuristicOnly,
        )
    }

    fn vectorizer(tokens: &[&str]) -> Vectorizer {
        Vectorizer {
            vocabulary: tokens
                .iter()
                .enumerate()
                .map(|(i, t)| (t.to_string(), i))
                .collect(),
            idf: None,
        }
    }

    /// Bundle with a fixed perform vote and a fixed label prediction,
    /// independent of the question.
    fn fixed_bundle(perform: bool, label: &str) -> ClassifierBundle {
        let perform_model = LinearModel {
            classes: vec!["false".into(), "true".into()],
            coef: vec![vec![]],
            intercept: vec![if perform { 4.0 } else { -4.0 }],
        };
        let label_model = LinearModel {
            classes: vec!["none".into(), label.to_string()],
            coef: vec![vec![], vec![]],
            intercept: vec![0.0, 3.0],
        };
        ClassifierBundle::from_parts(
            perform_model,
            Vectorizer {
                vocabulary: HashMap::new(),
                idf: None,
            },
            label_model,
            vectorizer(&[]),
        )
    }

    fn ml_engine(snap: RegistrySnapshot, perform: bool, label: &str) -> DecisionEngine {
        DecisionEngine::new(
            RegistryCache::preloaded(snap),
            DecisionStrategy::MlBacked(fixed_bundle(perform, label)),
        )
    }

    // ── Scenario A: metadata short-circuit ─────────────────────────

    #[tokio::test]
    async fn metadata_question_short_circuits() {
        let engine = heuristic_engine(snapshot(vec![(
            "analyze_temperatures",
            "",
            vec!["temperature"],
        )]));
        let d = engine
            .decide("What is the label and type of AHU_01?", None)
            .await;
        assert!(!d.perform_analytics);
        assert!(d.analytics.is_none());
        assert_eq!(d.confidence, 1.0);
        assert!(d.candidates.is_empty());
    }

    // ── Scenario B: pattern-driven heuristic selection ─────────────

    #[tokio::test]
    async fn pattern_match_selects_function() {
        let engine = heuristic_engine(snapshot(vec![(
            "analyze_temperatures",
            "",
            vec!["temperature.*analysis"],
        )]));
        let d = engine
            .decide("give me a temperature analysis for room 5.04", None)
            .await;
        assert!(d.perform_analytics);
        assert_eq!(d.analytics.as_deref(), Some("analyze_temperatures"));
        assert!(d.confidence >= 0.8, "confidence was {}", d.confidence);
        assert!(d.is_well_formed());
    }

    // ── Scenario C: heuristic keyword label, empty registry ────────

    #[tokio::test]
    async fn correlation_keyword_selects_builtin_label() {
        let engine = heuristic_engine(RegistrySnapshot::empty());
        let d = engine
            .decide("show correlation between humidity and CO2", None)
            .await;
        assert!(d.perform_analytics);
        assert_eq!(d.analytics.as_deref(), Some("correlate_sensors"));
        // Performing with no candidates.
        assert_eq!(d.confidence, 0.5);
        assert!(d.candidates.is_empty());
    }

    // ── Scenario D: lexical override of a negative ML vote ─────────

    #[tokio::test]
    async fn strong_candidate_flips_negative_ml_vote() {
        let engine = ml_engine(
            snapshot(vec![(
                "analyze_temperatures",
                "",
                vec!["temperature.*analysis"],
            )]),
            false,
            "none",
        );
        let d = engine
            .decide("run a temperature analysis for the atrium", None)
            .await;
        assert!(d.perform_analytics, "0.8 ≥ 0.75 must flip the decision");
        assert_eq!(d.analytics.as_deref(), Some("analyze_temperatures"));
        // Base 0.8 < 0.85, boosted +0.15 and capped: 0.95.
        assert_eq!(d.confidence, 0.95);
    }

    #[tokio::test]
    async fn weak_candidate_does_not_flip() {
        // Name overlap only: 1/2 tokens → 0.5, below the 0.75 threshold.
        let engine = ml_engine(
            snapshot(vec![("temperature_profile", "", vec![])]),
            false,
            "none",
        );
        let d = engine.decide("temperature please", None).await;
        assert!(!d.perform_analytics);
        assert!(d.analytics.is_none());
        assert_eq!(d.confidence, 0.5); // top candidate's score
        assert_eq!(d.candidates.len(), 1);
    }

    // ── ML label handling ──────────────────────────────────────────

    #[tokio::test]
    async fn known_ml_label_gets_synthetic_candidate() {
        // "analyze_co2" is registered but scores zero lexically.
        let engine = ml_engine(
            snapshot(vec![("analyze_co2", "", vec![])]),
            true,
            "analyze_co2",
        );
        let d = engine.decide("how stuffy was it yesterday?", None).await;
        assert!(d.perform_analytics);
        assert_eq!(d.analytics.as_deref(), Some("analyze_co2"));
        assert_eq!(d.candidates.len(), 1);
        assert_eq!(d.candidates[0].name, "analyze_co2");
        assert_eq!(d.candidates[0].score, ML_SYNTHETIC_SCORE);
        assert_eq!(d.candidates[0].reason, CandidateReason::MlPrediction);
        // Base 0.65 agrees with the label: 0.65 + 0.15 = 0.8.
        assert!((d.confidence - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn synthetic_candidate_sorts_below_stronger_match() {
        let engine = ml_engine(
            snapshot(vec![
                ("analyze_co2", "", vec![]),
                ("analyze_temperatures", "", vec!["temperature.*analysis"]),
            ]),
            true,
            "analyze_co2",
        );
        let d = engine.decide("temperature analysis for floor 2", None).await;
        assert!(d.perform_analytics);
        // The raw ML label is registry-known, so it is kept as the label.
        assert_eq!(d.analytics.as_deref(), Some("analyze_co2"));
        assert_eq!(d.candidates[0].name, "analyze_temperatures");
        assert_eq!(d.candidates[0].score, 0.8);
        assert_eq!(d.candidates[1].name, "analyze_co2");
        assert_eq!(d.candidates[1].score, ML_SYNTHETIC_SCORE);
        // Label disagrees with top candidate: no boost, base 0.8.
        assert_eq!(d.confidence, 0.8);
        assert!(d.is_well_formed());
    }

    #[tokio::test]
    async fn unknown_ml_label_substituted_with_top_candidate() {
        let engine = ml_engine(
            snapshot(vec![(
                "analyze_temperatures",
                "",
                vec!["temperature.*analysis"],
            )]),
            true,
            "made_up_function",
        );
        let d = engine.decide("temperature analysis for room 1", None).await;
        assert!(d.perform_analytics);
        assert_eq!(d.analytics.as_deref(), Some("analyze_temperatures"));
        // No synthetic candidate for a label the registry doesn't know.
        assert_eq!(d.candidates.len(), 1);
        assert_eq!(d.confidence, 0.95); // 0.8 boosted, capped
    }

    #[tokio::test]
    async fn unknown_ml_label_no_candidates_falls_back_to_keyword() {
        let engine = ml_engine(RegistrySnapshot::empty(), true, "made_up_function");
        let d = engine.decide("average co2 this week", None).await;
        assert!(d.perform_analytics);
        assert_eq!(d.analytics.as_deref(), Some("compute_average"));
        assert!(d.candidates.is_empty());
    }

    // ── Heuristic branch details ───────────────────────────────────

    #[tokio::test]
    async fn no_signal_means_no_analytics() {
        let engine = heuristic_engine(RegistrySnapshot::empty());
        let d = engine.decide("open the window", None).await;
        assert!(!d.perform_analytics);
        assert!(d.analytics.is_none());
        assert_eq!(d.confidence, 1.0);
        assert!(d.candidates.is_empty());
    }

    #[tokio::test]
    async fn empty_question_is_not_an_error() {
        let engine = heuristic_engine(RegistrySnapshot::empty());
        let d = engine.decide("", None).await;
        assert!(!d.perform_analytics);
        assert!(d.is_well_formed());
    }

    #[tokio::test]
    async fn cue_without_label_or_candidates_uses_fallback_label() {
        let engine = heuristic_engine(RegistrySnapshot::empty());
        let d = engine.decide("time in range for the setpoint", None).await;
        assert!(d.perform_analytics);
        assert_eq!(d.analytics.as_deref(), Some(FALLBACK_LABEL));
        assert_eq!(d.confidence, 0.5);
    }

    #[tokio::test]
    async fn keyword_label_beats_candidate_name() {
        // Keyword table takes precedence over the top candidate's name.
        let engine = heuristic_engine(snapshot(vec![(
            "analyze_temperatures",
            "",
            vec!["temperature"],
        )]));
        let d = engine
            .decide("trend of temperature in room 3", None)
            .await;
        assert!(d.perform_analytics);
        assert_eq!(d.analytics.as_deref(), Some("analyze_trend"));
        // Label differs from top candidate: no agreement boost.
        assert_eq!(d.confidence, 0.8);
    }

    #[tokio::test]
    async fn top_n_limits_candidates() {
        let engine = heuristic_engine(snapshot(vec![
            ("analyze_a", "", vec!["room 9"]),
            ("analyze_b", "", vec!["room 9"]),
            ("analyze_c", "", vec!["room 9"]),
            ("analyze_d", "", vec!["room 9"]),
        ]));
        let d = engine.decide("stats for room 9", Some(2)).await;
        assert_eq!(d.candidates.len(), 2);
        assert_eq!(d.candidates[0].name, "analyze_a");
        assert_eq!(d.candidates[1].name, "analyze_b");

        let d = engine.decide("stats for room 9", None).await;
        assert_eq!(d.candidates.len(), DEFAULT_TOP_N);
    }

    // ── Cross-cutting properties ───────────────────────────────────

    #[tokio::test]
    async fn decide_is_deterministic() {
        let engine = heuristic_engine(snapshot(vec![
            ("analyze_temperatures", "temperature statistics", vec![]),
            ("analyze_humidity", "humidity statistics", vec![]),
        ]));
        let a = engine.decide("temperature and humidity statistics", None).await;
        let b = engine.decide("temperature and humidity statistics", None).await;
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[tokio::test]
    async fn confidence_always_bounded() {
        let engine = heuristic_engine(snapshot(vec![
            ("analyze_temperatures", "temperature statistics", vec!["temp"]),
            ("correlate_sensors", "correlation of sensor pairs", vec![]),
        ]));
        for q in [
            "",
            "temperature",
            "correlation of temperature and humidity",
            "what is the average temp in room 1",
            "top 10 rooms by temp deviation",
        ] {
            let d = engine.decide(q, None).await;
            assert!(
                (0.0..=1.0).contains(&d.confidence),
                "confidence {} out of bounds for {q:?}",
                d.confidence
            );
            assert!(d.is_well_formed(), "malformed decision for {q:?}");
        }
    }

    #[tokio::test]
    async fn agreement_boost_capped_at_095() {
        // Base 0.8 agrees with the label: 0.8 + 0.15 would be 0.95 exactly,
        // and the cap keeps it there.
        let engine = heuristic_engine(snapshot(vec![(
            "analyze_temperatures",
            "",
            vec!["temperature.*analysis"],
        )]));
        let d = engine
            .decide("temperature analysis for room 2", None)
            .await;
        assert_eq!(d.confidence, 0.95);
    }

    #[test]
    fn keyword_table_coverage() {
        assert_eq!(keyword_label("average co2"), Some("compute_average"));
        assert_eq!(keyword_label("the mean value"), Some("compute_average"));
        assert_eq!(keyword_label("max co2 today"), Some("compute_max"));
        assert_eq!(keyword_label("maximum load"), Some("compute_max"));
        assert_eq!(keyword_label("highest reading"), Some("compute_max"));
        assert_eq!(keyword_label("min temperature"), Some("compute_min"));
        assert_eq!(keyword_label("minimum humidity"), Some("compute_min"));
        assert_eq!(keyword_label("sum of kwh"), Some("compute_sum"));
        assert_eq!(keyword_label("total energy"), Some("compute_sum"));
        assert_eq!(keyword_label("trend please"), Some("analyze_trend"));
        assert_eq!(keyword_label("forecast co2"), Some("analyze_trend"));
        assert_eq!(keyword_label("any anomalies"), Some("detect_anomalies"));
        assert_eq!(keyword_label("deviation from setpoint"), Some("detect_anomalies"));
        assert_eq!(keyword_label("correlate these"), Some("correlate_sensors"));
        assert_eq!(keyword_label("open the window"), None);
    }

    #[test]
    fn keyword_table_requires_word_boundaries() {
        // Short keywords must not fire inside unrelated words.
        assert_eq!(keyword_label("the climax of the day"), None);
        assert_eq!(keyword_label("determine the cause"), None);
        assert_eq!(keyword_label("assume nothing broke"), None);
        assert_eq!(keyword_label("the summary view"), None);
    }

    #[tokio::test]
    async fn bare_max_keyword_triggers_analytics() {
        let engine = heuristic_engine(RegistrySnapshot::empty());
        let d = engine.decide("max co2 today", None).await;
        assert!(d.perform_analytics);
        assert_eq!(d.analytics.as_deref(), Some("compute_max"));
        assert_eq!(d.confidence, 0.5);
    }
}
