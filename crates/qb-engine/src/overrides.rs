//! Metadata-only override detection.
//!
//! Some lexical patterns ("label", "type", "where is") are unambiguous
//! signals that a question wants ontology structure, not numeric
//! computation. Those questions must bypass analytics entirely — before
//! any scoring happens.
//!
//! Order is load-bearing: analytics cues are checked FIRST, so a strong
//! analytics signal always beats a weak metadata signal ("what is the
//! trend label for the CO2 sensor" stays on the analytics path).

use regex::Regex;
use std::sync::LazyLock;

/// Substrings that signal numeric analytics intent.
const ANALYTICS_CUES: &[&str] = &[
    "trend",
    "deviat",
    "correlat",
    "forecast",
    "anomal",
    "outlier",
    "time in range",
];

/// "top 5 rooms", "top 10 sensors" — ranked requests are analytics.
static RE_TOP_N: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btop\s+\d+\b").unwrap());

/// Substrings that signal an ontology/metadata lookup.
const METADATA_CUES: &[&str] = &[
    "label",
    "type",
    "class",
    "category",
    "installed",
    "location",
    "where is",
    "where are",
];

/// Listing-style questions ("list all sensors in the kitchen") are
/// metadata lookups even without an explicit metadata cue word.
static LISTING_TEMPLATES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^(list|show|which)\b.*\bsensors?\b").unwrap(),
        Regex::new(r"\bsensors?\b.*\b(in|at|for)\b").unwrap(),
    ]
});

/// Whether the question carries an explicit analytics cue. Also reused by
/// the heuristic decision branch, where the same table is read inverted.
pub fn has_analytics_cue(question: &str) -> bool {
    let lower = question.to_lowercase();
    ANALYTICS_CUES.iter().any(|c| lower.contains(c)) || RE_TOP_N.is_match(&lower)
}

/// Classify a question as "ontology/metadata-only" — one that must never
/// trigger analytics. Pure and case-insensitive.
pub fn is_metadata_only(question: &str) -> bool {
    let lower = question.to_lowercase();
    let lower = lower.trim();

    // Analytics cue wins over any metadata cue. Checked first.
    if has_analytics_cue(lower) {
        return false;
    }

    if METADATA_CUES.iter().any(|c| lower.contains(c)) {
        return true;
    }

    if LISTING_TEMPLATES.iter().any(|re| re.is_match(lower)) {
        return true;
    }

    // Default: assume analytics may be wanted; downstream scoring decides.
    false
}
