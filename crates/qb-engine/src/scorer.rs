//! Candidate scoring — lexical matching of questions against registry
//! descriptors.
//!
//! Three independent heuristics are evaluated per descriptor; the maximum
//! (not the sum) is taken so scores stay in [0, 1] without inflation.
//! Ordering is a total order (score desc, then name asc) so identical
//! inputs always produce identical output.

use qb_protocol::{Candidate, CandidateReason};

use crate::registry::{CompiledDescriptor, RegistrySnapshot};

/// Score for a registry-supplied regex pattern hit.
const PATTERN_WEIGHT: f64 = 0.8;
/// Ceiling for name-token overlap.
const NAME_OVERLAP_CEILING: f64 = 0.6;
/// Ceiling for description-word overlap.
const DESCRIPTION_OVERLAP_CEILING: f64 = 0.5;
/// Distinct description hits at which the description signal saturates.
const DESCRIPTION_SATURATION: f64 = 10.0;

/// Score every descriptor against the question and return the top-N
/// candidates. Truncation happens only after full scoring so it never
/// biases which descriptors are considered.
pub fn score_candidates(
    question: &str,
    snapshot: &RegistrySnapshot,
    top_n: usize,
) -> Vec<Candidate> {
    let lower = question.to_lowercase();

    let mut candidates: Vec<Candidate> = snapshot
        .functions
        .iter()
        .filter_map(|desc| score_descriptor(&lower, desc))
        .collect();

    sort_candidates(&mut candidates);
    candidates.truncate(top_n);
    candidates
}

/// Deterministic candidate order: score descending, ties by name
/// ascending.
pub(crate) fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.name.cmp(&b.name))
    });
}

fn score_descriptor(lower_question: &str, desc: &CompiledDescriptor) -> Option<Candidate> {
    // Heuristic 1: registry regex pattern match.
    let pattern = if desc.patterns.iter().any(|re| re.is_match(lower_question)) {
        PATTERN_WEIGHT
    } else {
        0.0
    };

    // Heuristic 2: name-token overlap, normalized by token count.
    let name = if desc.name_tokens.is_empty() {
        0.0
    } else {
        let hits = desc
            .name_tokens
            .iter()
            .filter(|t| lower_question.contains(t.as_str()))
            .count();
        (hits as f64 / desc.name_tokens.len() as f64).min(NAME_OVERLAP_CEILING)
    };

    // Heuristic 3: distinct description words present in the question.
    let description = {
        let hits = desc
            .description_tokens
            .iter()
            .filter(|t| lower_question.contains(t.as_str()))
            .count();
        (hits as f64 / DESCRIPTION_SATURATION).min(DESCRIPTION_OVERLAP_CEILING)
    };

    // Max across heuristics; ties resolve pattern > name > description.
    let mut best = (pattern, CandidateReason::PatternMatch);
    if name > best.0 {
        best = (name, CandidateReason::NameOverlap);
    }
    if description > best.0 {
        best = (description, CandidateReason::DescriptionOverlap);
    }

    (best.0 > 0.0).then(|| Candidate {
        name: desc.name.clone(),
        score: best.0,
        reason: best.1,
    })
}
