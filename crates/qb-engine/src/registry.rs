//! Compiled registry snapshots.
//!
//! Descriptors arrive from the wire as raw strings; everything the scorer
//! needs per request (regexes, name tokens, description tokens) is
//! computed once here, at snapshot build time, never per request.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashSet;

use qb_protocol::{FunctionDescriptor, RegistryFeed};

/// Description tokens shorter than this carry no signal.
const MIN_DESCRIPTION_TOKEN_LEN: usize = 4;

/// One registry function with its match metadata precompiled.
#[derive(Debug)]
pub struct CompiledDescriptor {
    pub name: String,
    pub description: String,
    /// Valid patterns only — invalid expressions are dropped at compile
    /// time with a warning, never surfaced at match time.
    pub patterns: Vec<Regex>,
    /// Lowercased tokens of `name`, split on `_`, `-`, and whitespace.
    pub name_tokens: Vec<String>,
    /// Distinct lowercased description words longer than 3 characters.
    pub description_tokens: Vec<String>,
}

impl CompiledDescriptor {
    fn compile(desc: FunctionDescriptor) -> Self {
        let patterns = desc
            .patterns
            .iter()
            .filter_map(|p| match Regex::new(&format!("(?i){p}")) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(
                        function = %desc.name,
                        pattern = %p,
                        error = %e,
                        "dropping invalid registry pattern"
                    );
                    None
                }
            })
            .collect();

        let name_tokens = desc
            .name
            .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut seen = HashSet::new();
        let description_tokens = desc
            .description
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= MIN_DESCRIPTION_TOKEN_LEN)
            .filter(|t| seen.insert(t.to_string()))
            .map(str::to_string)
            .collect();

        Self {
            name: desc.name,
            description: desc.description,
            patterns,
            name_tokens,
            description_tokens,
        }
    }
}

/// An immutable view of the registry at one point in time.
///
/// A new fetch produces a new snapshot object rather than mutating an
/// existing one, so concurrent readers never observe a half-updated list.
#[derive(Debug)]
pub struct RegistrySnapshot {
    pub functions: Vec<CompiledDescriptor>,
    pub fetched_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    /// Snapshot with no functions. `fetched_at` is the minimum timestamp
    /// so the cache treats it as stale and keeps trying to refresh.
    pub fn empty() -> Self {
        Self {
            functions: Vec::new(),
            fetched_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Compile a wire feed into a snapshot. Duplicate function names are
    /// deduplicated first-wins.
    pub fn from_feed(feed: RegistryFeed) -> Self {
        let mut seen = HashSet::new();
        let functions = feed
            .functions
            .into_iter()
            .filter(|d| seen.insert(d.name.clone()))
            .map(CompiledDescriptor::compile)
            .collect();
        Self {
            functions,
            fetched_at: Utc::now(),
        }
    }

    /// Whether a function with this exact name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.iter().any(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
