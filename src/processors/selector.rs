use super::{
    DepositProcessor, ProcessorContext, TransactionProcessor, TransferProcessor,
    WithdrawalProcessor,
};
use crate::domain::{TransactionError, TransactionType};

/// Maps a transaction kind to the processor that handles it.
#[derive(Clone)]
pub struct ProcessorSelector {
    ctx: ProcessorContext,
}

impl ProcessorSelector {
    pub fn new(ctx: ProcessorContext) -> Self {
        Self { ctx }
    }

    pub fn select(&self, kind: TransactionType) -> TransactionProcessor {
        let ctx = self.ctx.clone();
        match kind {
            TransactionType::Deposit => TransactionProcessor::Deposit(DepositProcessor::new(ctx)),
            TransactionType::Withdrawal => {
                TransactionProcessor::Withdrawal(WithdrawalProcessor::new(ctx))
            }
            TransactionType::Transfer => TransactionProcessor::Transfer(TransferProcessor::new(ctx)),
        }
    }

    /// Same as [`select`](Self::select) for a textual tag such as
    /// `"WITHDRAWAL"`. Unknown tags yield `UnsupportedType`.
    pub fn select_tag(&self, tag: &str) -> Result<TransactionProcessor, TransactionError> {
        Ok(self.select(tag.parse()?))
    }

    pub fn context(&self) -> &ProcessorContext {
        &self.ctx
    }
}
