use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::domain::{AccountId, ErrorCategory, Transaction, TransactionError, TransactionType};

/// Identity of one business operation as seen by observers.
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: Uuid,
    pub kind: TransactionType,
    pub account_id: AccountId,
    pub destination_id: Option<AccountId>,
    pub amount: BigDecimal,
}

impl Operation {
    pub fn single(kind: TransactionType, account_id: AccountId, amount: &BigDecimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            account_id,
            destination_id: None,
            amount: amount.clone(),
        }
    }

    pub fn transfer(source_id: AccountId, destination_id: AccountId, amount: &BigDecimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TransactionType::Transfer,
            account_id: source_id,
            destination_id: Some(destination_id),
            amount: amount.clone(),
        }
    }
}

#[derive(Debug)]
pub enum Stage<'a> {
    Started,
    Mutated {
        account_id: AccountId,
        new_balance: &'a BigDecimal,
    },
    Compensated {
        account_id: AccountId,
        delta: &'a BigDecimal,
    },
    Completed(&'a Transaction),
    Failed(&'a TransactionError),
}

/// Injected observability hook, invoked at entry, after each remote
/// mutation, after each compensation, and on completion or failure.
pub trait TransactionObserver: Send + Sync {
    fn observe(&self, operation: &Operation, stage: Stage<'_>);
}

/// Default observer: one structured `tracing` event per stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TransactionObserver for TracingObserver {
    fn observe(&self, op: &Operation, stage: Stage<'_>) {
        match stage {
            Stage::Started => tracing::info!(
                operation_id = %op.id,
                kind = %op.kind,
                account_id = op.account_id,
                destination_id = ?op.destination_id,
                amount = %op.amount,
                "Transaction started"
            ),
            Stage::Mutated {
                account_id,
                new_balance,
            } => tracing::info!(
                operation_id = %op.id,
                kind = %op.kind,
                account_id,
                new_balance = %new_balance,
                "Balance adjusted"
            ),
            Stage::Compensated { account_id, delta } => tracing::warn!(
                operation_id = %op.id,
                kind = %op.kind,
                account_id,
                delta = %delta,
                "Balance change reversed"
            ),
            Stage::Completed(tx) => tracing::info!(
                operation_id = %op.id,
                kind = %op.kind,
                transaction_id = %tx.id,
                outcome = "completed",
                "Transaction recorded"
            ),
            Stage::Failed(err) => match err.category() {
                ErrorCategory::BadInput | ErrorCategory::NotFound | ErrorCategory::Conflict => {
                    tracing::warn!(
                        operation_id = %op.id,
                        kind = %op.kind,
                        outcome = "rejected",
                        category = err.category().as_str(),
                        error = %err,
                        "Transaction rejected"
                    )
                }
                ErrorCategory::Upstream | ErrorCategory::Storage => tracing::error!(
                    operation_id = %op.id,
                    kind = %op.kind,
                    outcome = "failed",
                    category = err.category().as_str(),
                    error = %err,
                    "Transaction failed"
                ),
            },
        }
    }
}
