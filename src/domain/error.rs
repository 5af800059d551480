use bigdecimal::BigDecimal;
use thiserror::Error;
use uuid::Uuid;

use super::AccountId;

/// Response category of a failed operation. This, not the message text, is
/// what callers are expected to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    BadInput,
    NotFound,
    Conflict,
    Upstream,
    Storage,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::BadInput => "bad_input",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Upstream => "upstream",
            ErrorCategory::Storage => "storage",
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum TransactionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Insufficient balance in account {account_id}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account_id: AccountId,
        balance: BigDecimal,
        requested: BigDecimal,
    },

    #[error("Account service error: {0}")]
    RemoteService(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unsupported transaction type: {0}")]
    UnsupportedType(String),

    #[error("Account {0} was modified by a concurrent operation")]
    Conflict(AccountId),

    #[error("Request with idempotency key {0} is already being processed")]
    DuplicateRequest(String),

    #[error("Request with idempotency key {0} left balances unresolved; see dead letters")]
    Unresolved(String),

    /// A step after the first balance mutation failed and at least one
    /// reversal could not be applied. Every unapplied reversal has a dead
    /// letter.
    #[error("{cause}; compensation failed, {} dead letter(s) recorded", dead_letters.len())]
    CompensationFailed {
        cause: Box<TransactionError>,
        dead_letters: Vec<Uuid>,
    },
}

impl TransactionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TransactionError::Validation(_)
            | TransactionError::UnsupportedOperation(_)
            | TransactionError::UnsupportedType(_) => ErrorCategory::BadInput,
            TransactionError::AccountNotFound(_) => ErrorCategory::NotFound,
            TransactionError::InsufficientBalance { .. }
            | TransactionError::Conflict(_)
            | TransactionError::DuplicateRequest(_)
            | TransactionError::Unresolved(_) => ErrorCategory::Conflict,
            TransactionError::RemoteService(_) | TransactionError::CompensationFailed { .. } => {
                ErrorCategory::Upstream
            }
            TransactionError::Storage(_) => ErrorCategory::Storage,
        }
    }
}
