use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::AppState;

/// Compensations that still need an operator.
pub async fn list_dead_letters(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let entries = state.service.dead_letters().await?;

    Ok(Json(json!({
        "dlq_entries": entries,
        "count": entries.len()
    })))
}
