use bigdecimal::BigDecimal;

use super::compensation::{compensate, hold, Reversal};
use super::{Operation, ProcessorContext, Stage};
use crate::domain::{
    validate_amount, AccountId, AccountSnapshot, NewTransaction, Transaction, TransactionError,
    TransactionType,
};

/// Moves an amount between two accounts.
///
/// The source is debited first. If the credit or the record append fails
/// afterwards, every applied change is reversed before the error is
/// returned; reversals that cannot be applied end up as dead letters. When
/// a failed step may still have taken effect and a fresh read cannot tell,
/// nothing is reversed and the owed reversals go straight to dead letters.
#[derive(Clone)]
pub struct TransferProcessor {
    ctx: ProcessorContext,
}

impl TransferProcessor {
    pub fn new(ctx: ProcessorContext) -> Self {
        Self { ctx }
    }

    pub async fn process(
        &self,
        source_id: AccountId,
        destination_id: AccountId,
        amount: &BigDecimal,
    ) -> Result<Transaction, TransactionError> {
        let op = Operation::transfer(source_id, destination_id, amount);
        self.ctx.started(&op);
        let result = self.run(&op, source_id, destination_id, amount).await;
        self.ctx.finish(&op, result)
    }

    async fn run(
        &self,
        op: &Operation,
        source_id: AccountId,
        destination_id: AccountId,
        amount: &BigDecimal,
    ) -> Result<Transaction, TransactionError> {
        let amount = validate_amount(amount)?;
        if source_id == destination_id {
            return Err(TransactionError::Validation(format!(
                "source and destination must differ (both are account {source_id})"
            )));
        }

        let source = self.ctx.fetch(source_id).await?;
        let destination = self.ctx.fetch(destination_id).await?;

        if !source.covers(&amount) {
            return Err(TransactionError::InsufficientBalance {
                account_id: source_id,
                balance: source.balance,
                requested: amount.into_inner(),
            });
        }

        let new_source = &source.balance - amount.value();
        let new_destination = &destination.balance + amount.value();
        debug_assert_eq!(
            &new_source + &new_destination,
            &source.balance + &destination.balance
        );

        self.ctx.adjust(op, &source, &new_source).await?;

        let restore_source = || Reversal {
            account_id: source_id,
            delta: amount.value().clone(),
        };
        let restore_both = || {
            vec![
                Reversal {
                    account_id: destination_id,
                    delta: -amount.value().clone(),
                },
                restore_source(),
            ]
        };

        if let Err(cause) = self.ctx.adjust(op, &destination, &new_destination).await {
            match self.credit_outcome(&cause, &destination, &new_destination).await {
                CreditOutcome::Applied => self.ctx.observer.observe(
                    op,
                    Stage::Mutated {
                        account_id: destination_id,
                        new_balance: &new_destination,
                    },
                ),
                CreditOutcome::NotApplied => {
                    return Err(compensate(&self.ctx, op, vec![restore_source()], cause).await);
                }
                CreditOutcome::Unknown => {
                    let reason = format!("credit of account {destination_id} may have been applied");
                    return Err(hold(&self.ctx, op, vec![restore_source()], reason, cause).await);
                }
            }
        }

        let new_tx = NewTransaction::new(
            TransactionType::Transfer,
            amount.clone(),
            source.account_number,
            Some(destination.account_number),
        );
        let save_error = match self.ctx.store.save(new_tx.clone()).await {
            Ok(tx) => return Ok(tx),
            Err(e) => e,
        };

        // The append may have committed before the error surfaced.
        match self.ctx.store.find_recorded(&new_tx).await {
            Ok(Some(tx)) => {
                tracing::warn!(
                    operation_id = %op.id,
                    transaction_id = %tx.id,
                    error = %save_error,
                    "Transaction record persisted despite store error"
                );
                Ok(tx)
            }
            Ok(None) => Err(compensate(&self.ctx, op, restore_both(), save_error.into()).await),
            Err(lookup_error) => {
                let reason = format!("transaction record may have been persisted: {lookup_error}");
                Err(hold(&self.ctx, op, restore_both(), reason, save_error.into()).await)
            }
        }
    }

    /// Decides whether a failed credit reached the account.
    ///
    /// Only a transport failure leaves that open; a rejection or a missing
    /// account means nothing was written. Otherwise the account is read
    /// again: untouched means not applied, the submitted balance means
    /// applied, anything else cannot be told apart.
    async fn credit_outcome(
        &self,
        cause: &TransactionError,
        before: &AccountSnapshot,
        submitted: &BigDecimal,
    ) -> CreditOutcome {
        if !matches!(cause, TransactionError::RemoteService(_)) {
            return CreditOutcome::NotApplied;
        }

        let now = match self.ctx.accounts.fetch_account(before.account_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    account_id = before.account_id,
                    error = %e,
                    "Could not re-read account after failed credit"
                );
                return CreditOutcome::Unknown;
            }
        };

        if now.balance == before.balance && now.version == before.version {
            CreditOutcome::NotApplied
        } else if now.balance == *submitted {
            CreditOutcome::Applied
        } else {
            CreditOutcome::Unknown
        }
    }
}

enum CreditOutcome {
    Applied,
    NotApplied,
    Unknown,
}
