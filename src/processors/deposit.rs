use bigdecimal::BigDecimal;

use super::{record_transaction, Operation, ProcessorContext};
use crate::domain::{validate_amount, AccountId, Transaction, TransactionError, TransactionType};

/// Credits a single account.
#[derive(Clone)]
pub struct DepositProcessor {
    ctx: ProcessorContext,
}

impl DepositProcessor {
    pub fn new(ctx: ProcessorContext) -> Self {
        Self { ctx }
    }

    pub async fn process(
        &self,
        account_id: AccountId,
        amount: &BigDecimal,
    ) -> Result<Transaction, TransactionError> {
        let op = Operation::single(TransactionType::Deposit, account_id, amount);
        self.ctx.started(&op);
        let result = self.run(&op, account_id, amount).await;
        self.ctx.finish(&op, result)
    }

    async fn run(
        &self,
        op: &Operation,
        account_id: AccountId,
        amount: &BigDecimal,
    ) -> Result<Transaction, TransactionError> {
        let amount = validate_amount(amount)?;
        let account = self.ctx.fetch(account_id).await?;

        let new_balance = &account.balance + amount.value();
        self.ctx.adjust(op, &account, &new_balance).await?;

        record_transaction(
            self.ctx.store.as_ref(),
            amount,
            TransactionType::Deposit,
            &account.account_number,
            None,
        )
        .await
    }
}
