pub mod accounts;
pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod processors;
pub mod services;
pub mod startup;
pub mod utils;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::services::TransactionService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TransactionService>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/transaction/deposit", post(handlers::transactions::deposit))
        .route("/transaction/withdrawal", post(handlers::transactions::withdrawal))
        .route("/transaction/transfer", post(handlers::transactions::transfer))
        .route("/transaction/transferTo", post(handlers::transactions::transfer))
        .route("/transaction/history", get(handlers::transactions::history))
        .route("/dlq", get(handlers::dead_letters::list_dead_letters))
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .with_state(state)
}
