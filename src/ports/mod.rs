//! Ports the transaction core talks through.
//! Adapters live in `crate::accounts` (HTTP) and `crate::adapters` (storage).

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use thiserror::Error;

use crate::domain::{
    AccountId, AccountSnapshot, AccountVersion, DeadLetter, NewTransaction, Transaction,
    TransactionError,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccountServiceError {
    #[error("Account {0} not found")]
    NotFound(AccountId),
    #[error("Version mismatch for account {0}")]
    VersionMismatch(AccountId),
    #[error("{0}")]
    Unavailable(String),
}

impl From<AccountServiceError> for TransactionError {
    fn from(err: AccountServiceError) -> Self {
        match err {
            AccountServiceError::NotFound(id) => TransactionError::AccountNotFound(id),
            AccountServiceError::VersionMismatch(id) => TransactionError::Conflict(id),
            AccountServiceError::Unavailable(message) => TransactionError::RemoteService(message),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("{0}")]
    Unavailable(String),
}

impl From<StoreError> for TransactionError {
    fn from(err: StoreError) -> Self {
        TransactionError::Storage(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
        }
    }
}

/// Non-blocking contract of the remote account service, the sole owner of
/// balances.
#[async_trait]
pub trait AccountServiceClient: Send + Sync {
    async fn fetch_account(&self, account_id: AccountId)
        -> Result<AccountSnapshot, AccountServiceError>;

    /// Sets the balance to `new_balance`. When `expected_version` is given
    /// the service must reject the write if the account moved on since.
    async fn adjust_balance(
        &self,
        account_id: AccountId,
        new_balance: &BigDecimal,
        expected_version: Option<&AccountVersion>,
    ) -> Result<(), AccountServiceError>;

    fn circuit_state(&self) -> CircuitState {
        CircuitState::Closed
    }
}

/// Append-only transaction log.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persists the record and assigns its identifier.
    async fn save(&self, transaction: NewTransaction) -> Result<Transaction, StoreError>;
    async fn list_all(&self) -> Result<Vec<Transaction>, StoreError>;

    /// Looks up a record that `save` may have persisted before failing.
    async fn find_recorded(&self, transaction: &NewTransaction) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .find(|stored| transaction.matches(stored)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyStatus {
    /// The key was free and is now claimed by the caller.
    New,
    /// Another request holding the key has not finished.
    Processing,
    Completed {
        fingerprint: String,
        transaction: Transaction,
    },
    /// An earlier request under this key left balances that need an
    /// operator; the key is never run again.
    Parked { fingerprint: String },
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically claims `key`, or reports what an earlier request left.
    async fn begin(&self, key: &str, fingerprint: &str) -> Result<IdempotencyStatus, StoreError>;
    async fn complete(
        &self,
        key: &str,
        fingerprint: &str,
        transaction: &Transaction,
    ) -> Result<(), StoreError>;
    async fn release(&self, key: &str) -> Result<(), StoreError>;
    /// Marks `key` as permanently settled by a failed compensation.
    async fn park(&self, key: &str, fingerprint: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn push(&self, letter: &DeadLetter) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<DeadLetter>, StoreError>;
}
