//! QueryBrick API server — intent routing for building analytics questions.
//!
//! Wires the decision engine together: registry cache over the external
//! function registry, optional classifier bundle, and the Axum router.

mod config;
mod error;
mod routes;
mod state;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use qb_engine::decide::{DecisionEngine, DecisionStrategy};
use qb_engine::{ClassifierBundle, HttpRegistrySource, RegistryCache};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "qb-server starting");

    let config = match std::env::var("QB_CONFIG") {
        Ok(path) => ServerConfig::from_file(&path)?,
        Err(_) => ServerConfig::from_env(),
    };

    // Classifier absence is a supported configuration: log once at
    // startup and run heuristics only, never per-request.
    let strategy = match &config.classifier_dir {
        Some(dir) => match ClassifierBundle::load(Path::new(dir)) {
            Ok(bundle) => {
                tracing::info!(dir = %dir, "classifier bundle loaded");
                DecisionStrategy::MlBacked(bundle)
            }
            Err(e) => {
                tracing::warn!(dir = %dir, error = %e, "classifier bundle unavailable, falling back to heuristics");
                DecisionStrategy::HeuristicOnly
            }
        },
        None => {
            tracing::info!("no classifier directory configured, heuristic-only mode");
            DecisionStrategy::HeuristicOnly
        }
    };

    // Sample-registry mode for local development without a live registry.
    let state = if std::env::var("QB_SAMPLE_REGISTRY").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")) {
        tracing::warn!("QB_SAMPLE_REGISTRY set, serving a fixed sample registry");
        AppState::with_sample_registry()
    } else {
        let source = HttpRegistrySource::new(
            config.registry_base_url.clone(),
            Duration::from_secs(config.registry_fetch_timeout_secs),
        );
        let cache = RegistryCache::new(
            Arc::new(source),
            Duration::from_secs(config.registry_ttl_secs),
        );
        // Best-effort first fill; an unreachable registry must not block startup.
        cache.prime().await;
        AppState::new(DecisionEngine::new(cache, strategy))
    };
    let app = routes::build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
