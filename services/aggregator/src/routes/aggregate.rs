use axum::{extract::State, Json};

use crate::{errors::AppResult, orchestrator::AggregateResult, AppState};

/// Call service-a once and return its payload next to our own identity.
///
/// Any downstream problem (refused connection, timeout, non-2xx, unreadable
/// body) becomes a 502 whose message embeds the underlying cause.
pub async fn handler(State(state): State<AppState>) -> AppResult<Json<AggregateResult>> {
    let result = state.orchestrator.aggregate().await?;
    Ok(Json(result))
}
