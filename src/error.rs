use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::{ErrorCategory, TransactionError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn category(&self) -> ErrorCategory {
        match self {
            AppError::Transaction(err) => err.category(),
            AppError::BadRequest(_) => ErrorCategory::BadInput,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::BadInput => StatusCode::BAD_REQUEST,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::Upstream => StatusCode::BAD_GATEWAY,
            ErrorCategory::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "category": self.category().as_str(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
