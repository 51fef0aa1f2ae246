//! Shared application state for the Axum server.

use std::sync::Arc;

use qb_engine::decide::{DecisionEngine, DecisionStrategy};
use qb_engine::{RegistryCache, RegistrySnapshot};
use qb_protocol::{FunctionDescriptor, RegistryFeed};

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
}

impl AppState {
    pub fn new(engine: DecisionEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Heuristic-only state over a fixed snapshot (tests).
    pub fn with_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self::new(DecisionEngine::new(
            RegistryCache::preloaded(snapshot),
            DecisionStrategy::HeuristicOnly,
        ))
    }

    /// State with a small sample registry for development and tests.
    pub fn with_sample_registry() -> Self {
        let feed = RegistryFeed {
            functions: vec![
                sample(
                    "analyze_temperatures",
                    "Statistics over temperature sensor readings",
                    &["temperature.*analysis", "analy[sz]e.*temperature"],
                ),
                sample(
                    "correlate_sensors",
                    "Correlation between two sensor time series",
                    &["correlat"],
                ),
                sample(
                    "detect_anomalies",
                    "Anomaly detection over sensor readings",
                    &["anomal", "outlier"],
                ),
            ],
            count: 3,
        };
        Self::with_snapshot(RegistrySnapshot::from_feed(feed))
    }
}

fn sample(name: &str, description: &str, patterns: &[&str]) -> FunctionDescriptor {
    FunctionDescriptor {
        name: name.into(),
        description: description.into(),
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        parameters: serde_json::Value::Null,
    }
}
