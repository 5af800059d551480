pub mod dead_letters;
pub mod transactions;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::ports::CircuitState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub account_service: String,
}

/// Reports unhealthy while the account service circuit breaker is open.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let circuit = state.service.account_service_state();

    let (status_code, status) = match circuit {
        CircuitState::Closed => (StatusCode::OK, "healthy"),
        CircuitState::Open => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    let health_response = HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        account_service: circuit.as_str().to_string(),
    };

    (status_code, Json(health_response))
}
