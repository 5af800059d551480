use bigdecimal::BigDecimal;
use std::sync::Arc;

use crate::domain::{AccountId, DeadLetter, Transaction, TransactionError, TransactionType};
use crate::ports::{CircuitState, IdempotencyStatus, IdempotencyStore};
use crate::processors::{ProcessorContext, ProcessorSelector};

/// One business request, as accepted by [`TransactionService::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionRequest {
    Deposit {
        account_id: AccountId,
        amount: BigDecimal,
    },
    Withdrawal {
        account_id: AccountId,
        amount: BigDecimal,
    },
    Transfer {
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: BigDecimal,
    },
}

impl TransactionRequest {
    pub fn kind(&self) -> TransactionType {
        match self {
            TransactionRequest::Deposit { .. } => TransactionType::Deposit,
            TransactionRequest::Withdrawal { .. } => TransactionType::Withdrawal,
            TransactionRequest::Transfer { .. } => TransactionType::Transfer,
        }
    }

    /// Stable description of the request used to detect an idempotency key
    /// being reused for a different operation. `10.0` and `10` compare equal.
    pub fn fingerprint(&self) -> String {
        match self {
            TransactionRequest::Deposit { account_id, amount }
            | TransactionRequest::Withdrawal { account_id, amount } => {
                format!("{}:{}:{}", self.kind(), account_id, amount.normalized())
            }
            TransactionRequest::Transfer {
                source_account_id,
                destination_account_id,
                amount,
            } => format!(
                "{}:{}:{}:{}",
                self.kind(),
                source_account_id,
                destination_account_id,
                amount.normalized()
            ),
        }
    }
}

/// Entry point for callers: picks the processor, and layers idempotency
/// keys and opt-in conflict retries on top of it.
#[derive(Clone)]
pub struct TransactionService {
    selector: ProcessorSelector,
    idempotency: Arc<dyn IdempotencyStore>,
    conflict_retry_limit: u32,
}

impl TransactionService {
    pub fn new(ctx: ProcessorContext, idempotency: Arc<dyn IdempotencyStore>) -> Self {
        Self {
            selector: ProcessorSelector::new(ctx),
            idempotency,
            conflict_retry_limit: 0,
        }
    }

    pub fn with_conflict_retries(mut self, limit: u32) -> Self {
        self.conflict_retry_limit = limit;
        self
    }

    pub async fn register_deposit(
        &self,
        account_id: AccountId,
        amount: &BigDecimal,
    ) -> Result<Transaction, TransactionError> {
        self.selector
            .select(TransactionType::Deposit)
            .process_single_account(account_id, amount)
            .await
    }

    pub async fn register_withdrawal(
        &self,
        account_id: AccountId,
        amount: &BigDecimal,
    ) -> Result<Transaction, TransactionError> {
        self.selector
            .select(TransactionType::Withdrawal)
            .process_single_account(account_id, amount)
            .await
    }

    pub async fn register_transfer(
        &self,
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: &BigDecimal,
    ) -> Result<Transaction, TransactionError> {
        self.selector
            .select(TransactionType::Transfer)
            .process_transfer(source_account_id, destination_account_id, amount)
            .await
    }

    pub async fn list_history(&self) -> Result<Vec<Transaction>, TransactionError> {
        Ok(self.selector.context().store().list_all().await?)
    }

    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>, TransactionError> {
        Ok(self.selector.context().dead_letters().list().await?)
    }

    pub fn account_service_state(&self) -> CircuitState {
        self.selector.context().accounts().circuit_state()
    }

    /// Runs `request`, honouring `idempotency_key` when one is given.
    ///
    /// A key that already completed with the same request returns the
    /// recorded transaction without touching any account. A key still in
    /// flight fails `DuplicateRequest`, and a key whose request ended in
    /// `CompensationFailed` fails `Unresolved` for good. If the key store
    /// cannot be reached the request is refused rather than run unprotected.
    pub async fn execute(
        &self,
        request: TransactionRequest,
        idempotency_key: Option<&str>,
    ) -> Result<Transaction, TransactionError> {
        let Some(key) = idempotency_key else {
            return self.dispatch_with_retry(&request).await;
        };

        let fingerprint = request.fingerprint();
        match self.idempotency.begin(key, &fingerprint).await? {
            IdempotencyStatus::New => {}
            IdempotencyStatus::Processing => {
                return Err(TransactionError::DuplicateRequest(key.to_string()));
            }
            IdempotencyStatus::Completed {
                fingerprint: recorded,
                transaction,
            } => {
                if recorded != fingerprint {
                    return Err(TransactionError::Validation(format!(
                        "idempotency key {key} was already used for a different request"
                    )));
                }
                tracing::info!(
                    idempotency_key = key,
                    transaction_id = %transaction.id,
                    "Replaying completed request"
                );
                return Ok(transaction);
            }
            IdempotencyStatus::Parked { fingerprint: recorded } => {
                if recorded != fingerprint {
                    return Err(TransactionError::Validation(format!(
                        "idempotency key {key} was already used for a different request"
                    )));
                }
                return Err(TransactionError::Unresolved(key.to_string()));
            }
        }

        let result = self.dispatch_with_retry(&request).await;
        match &result {
            Ok(tx) => {
                if let Err(e) = self.idempotency.complete(key, &fingerprint, tx).await {
                    tracing::error!(
                        idempotency_key = key,
                        transaction_id = %tx.id,
                        error = %e,
                        "Failed to store idempotency result"
                    );
                }
            }
            // Balances may be off until the dead letters are resolved, so a
            // blind retry under the same key must not run again.
            Err(TransactionError::CompensationFailed { .. }) => {
                tracing::warn!(idempotency_key = key, "Parking idempotency key");
                if let Err(e) = self.idempotency.park(key, &fingerprint).await {
                    tracing::error!(
                        idempotency_key = key,
                        error = %e,
                        "Failed to park idempotency key"
                    );
                }
            }
            Err(_) => {
                if let Err(e) = self.idempotency.release(key).await {
                    tracing::error!(
                        idempotency_key = key,
                        error = %e,
                        "Failed to release idempotency key"
                    );
                }
            }
        }
        result
    }

    async fn dispatch_with_retry(
        &self,
        request: &TransactionRequest,
    ) -> Result<Transaction, TransactionError> {
        let mut attempt = 0;
        loop {
            match self.dispatch(request).await {
                Err(TransactionError::Conflict(account_id)) if attempt < self.conflict_retry_limit => {
                    attempt += 1;
                    tracing::warn!(
                        kind = %request.kind(),
                        account_id,
                        attempt,
                        "Version conflict, retrying with fresh snapshots"
                    );
                }
                result => return result,
            }
        }
    }

    async fn dispatch(&self, request: &TransactionRequest) -> Result<Transaction, TransactionError> {
        match request {
            TransactionRequest::Deposit { account_id, amount } => {
                self.register_deposit(*account_id, amount).await
            }
            TransactionRequest::Withdrawal { account_id, amount } => {
                self.register_withdrawal(*account_id, amount).await
            }
            TransactionRequest::Transfer {
                source_account_id,
                destination_account_id,
                amount,
            } => {
                self.register_transfer(*source_account_id, *destination_account_id, amount)
                    .await
            }
        }
    }
}
