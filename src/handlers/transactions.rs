use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;

use crate::domain::{AccountId, Transaction};
use crate::error::AppError;
use crate::services::TransactionRequest;
use crate::AppState;

pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub account_id: AccountId,
    #[serde(deserialize_with = "crate::utils::decimal::deserialize")]
    pub amount: BigDecimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub account_id: AccountId,
    #[serde(deserialize_with = "crate::utils::decimal::deserialize")]
    pub amount: BigDecimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    #[serde(deserialize_with = "crate::utils::decimal::deserialize")]
    pub amount: BigDecimal,
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    match headers.get(IDEMPOTENCY_HEADER) {
        None => Ok(None),
        Some(value) => match value.to_str().map(str::trim) {
            Ok(key) if !key.is_empty() => Ok(Some(key.to_string())),
            _ => Err(AppError::BadRequest(
                "Invalid idempotency key format".to_string(),
            )),
        },
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

async fn run(
    state: &AppState,
    headers: &HeaderMap,
    request: TransactionRequest,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let key = idempotency_key(headers)?;
    let tx = state.service.execute(request, key.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

pub async fn deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<DepositRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let req = body(payload)?;
    let request = TransactionRequest::Deposit {
        account_id: req.account_id,
        amount: req.amount,
    };
    run(&state, &headers, request).await
}

pub async fn withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<WithdrawalRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let req = body(payload)?;
    let request = TransactionRequest::Withdrawal {
        account_id: req.account_id,
        amount: req.amount,
    };
    run(&state, &headers, request).await
}

pub async fn transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let req = body(payload)?;
    let request = TransactionRequest::Transfer {
        source_account_id: req.source_account_id,
        destination_account_id: req.destination_account_id,
        amount: req.amount,
    };
    run(&state, &headers, request).await
}

pub async fn history(State(state): State<AppState>) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(state.service.list_history().await?))
}
