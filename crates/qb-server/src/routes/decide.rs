//! Decision endpoint.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use qb_protocol::{DecideRequest, Decision};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /decide — route a question.
///
/// Never returns a 5xx for any input short of malformed JSON in the
/// request body itself; internal degradations (stale registry, missing
/// classifiers) are absorbed into a valid decision.
pub async fn decide(
    State(state): State<AppState>,
    payload: Result<Json<DecideRequest>, JsonRejection>,
) -> ApiResult<Json<Decision>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let decision = state.engine.decide(&request.question, request.top_n).await;
    Ok(Json(decision))
}
