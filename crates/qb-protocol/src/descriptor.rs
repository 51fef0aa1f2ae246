//! Registry feed types — the wire format of the external analytics
//! function registry.
//!
//! The registry endpoint is untrusted and best-effort: every field except
//! `name` may be missing, and deserialization must tolerate that rather
//! than reject the whole feed.

use serde::{Deserialize, Serialize};

/// One invocable analytics function as advertised by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Unique function identifier (e.g., "analyze_temperatures").
    pub name: String,
    /// Free-text description of what the function computes.
    #[serde(default)]
    pub description: String,
    /// Regular-expression strings matched against questions. May be empty
    /// or contain invalid expressions; invalid ones are dropped downstream.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Parameter schema, passed through untouched (the engine never
    /// inspects it — execution is a separate collaborator's job).
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Body of `GET <registry-base>/analytics/functions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryFeed {
    #[serde(default)]
    pub functions: Vec<FunctionDescriptor>,
    #[serde(default)]
    pub count: usize,
}
