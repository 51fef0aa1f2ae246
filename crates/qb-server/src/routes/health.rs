//! Health check endpoint.

use axum::Json;
use axum::extract::State;

use qb_protocol::HealthResponse;

use crate::state::AppState;

/// GET /health — liveness check plus the size of the current registry
/// snapshot. Reads whatever is cached; never triggers a refresh.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        registry_count: state.engine.registry_count().await,
    })
}
