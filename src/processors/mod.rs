//! Transaction processors.
//!
//! One variant per transaction kind, dispatched through
//! [`TransactionProcessor`]. Every variant follows the same ordered chain:
//! validate the amount, read fresh snapshots, check sufficiency, mutate the
//! remote balances, append the record. Nothing is mutated before every check
//! has passed.

mod compensation;
mod deposit;
mod observer;
mod selector;
mod transfer;
mod withdrawal;

pub use compensation::CompensationPolicy;
pub use deposit::DepositProcessor;
pub use observer::{Operation, Stage, TracingObserver, TransactionObserver};
pub use selector::ProcessorSelector;
pub use transfer::TransferProcessor;
pub use withdrawal::WithdrawalProcessor;

use bigdecimal::BigDecimal;
use std::fmt;
use std::sync::Arc;

use crate::domain::{
    AccountId, AccountSnapshot, Amount, NewTransaction, Transaction, TransactionError,
    TransactionType,
};
use crate::ports::{AccountServiceClient, DeadLetterSink, TransactionStore};

/// Collaborators shared by every processor. Cheap to clone.
#[derive(Clone)]
pub struct ProcessorContext {
    accounts: Arc<dyn AccountServiceClient>,
    store: Arc<dyn TransactionStore>,
    dead_letters: Arc<dyn DeadLetterSink>,
    observer: Arc<dyn TransactionObserver>,
    compensation: CompensationPolicy,
}

impl ProcessorContext {
    pub fn new(
        accounts: Arc<dyn AccountServiceClient>,
        store: Arc<dyn TransactionStore>,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self {
            accounts,
            store,
            dead_letters,
            observer: Arc::new(TracingObserver),
            compensation: CompensationPolicy::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransactionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_compensation(mut self, policy: CompensationPolicy) -> Self {
        self.compensation = policy;
        self
    }

    pub fn accounts(&self) -> &Arc<dyn AccountServiceClient> {
        &self.accounts
    }

    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    pub fn dead_letters(&self) -> &Arc<dyn DeadLetterSink> {
        &self.dead_letters
    }

    fn started(&self, op: &Operation) {
        self.observer.observe(op, Stage::Started);
    }

    fn finish(
        &self,
        op: &Operation,
        result: Result<Transaction, TransactionError>,
    ) -> Result<Transaction, TransactionError> {
        match &result {
            Ok(tx) => self.observer.observe(op, Stage::Completed(tx)),
            Err(err) => self.observer.observe(op, Stage::Failed(err)),
        }
        result
    }

    async fn fetch(&self, account_id: AccountId) -> Result<AccountSnapshot, TransactionError> {
        Ok(self.accounts.fetch_account(account_id).await?)
    }

    async fn adjust(
        &self,
        op: &Operation,
        snapshot: &AccountSnapshot,
        new_balance: &BigDecimal,
    ) -> Result<(), TransactionError> {
        self.accounts
            .adjust_balance(snapshot.account_id, new_balance, snapshot.version.as_ref())
            .await?;
        self.observer.observe(
            op,
            Stage::Mutated {
                account_id: snapshot.account_id,
                new_balance,
            },
        );
        Ok(())
    }
}

/// Builds the record for a completed operation and appends it to the log.
/// A store failure is returned as `Storage` without retry.
pub async fn record_transaction(
    store: &dyn TransactionStore,
    amount: Amount,
    kind: TransactionType,
    origin_account: &str,
    destination_account: Option<&str>,
) -> Result<Transaction, TransactionError> {
    let new_tx = NewTransaction::new(
        kind,
        amount,
        origin_account.to_string(),
        destination_account.map(str::to_string),
    );
    Ok(store.save(new_tx).await?)
}

#[derive(Clone)]
pub enum TransactionProcessor {
    Deposit(DepositProcessor),
    Withdrawal(WithdrawalProcessor),
    Transfer(TransferProcessor),
}

impl TransactionProcessor {
    pub fn kind(&self) -> TransactionType {
        match self {
            TransactionProcessor::Deposit(_) => TransactionType::Deposit,
            TransactionProcessor::Withdrawal(_) => TransactionType::Withdrawal,
            TransactionProcessor::Transfer(_) => TransactionType::Transfer,
        }
    }

    pub async fn process_single_account(
        &self,
        account_id: AccountId,
        amount: &BigDecimal,
    ) -> Result<Transaction, TransactionError> {
        match self {
            TransactionProcessor::Deposit(p) => p.process(account_id, amount).await,
            TransactionProcessor::Withdrawal(p) => p.process(account_id, amount).await,
            TransactionProcessor::Transfer(_) => Err(TransactionError::UnsupportedOperation(
                "a transfer needs a source and a destination account; use process_transfer"
                    .to_string(),
            )),
        }
    }

    pub async fn process_transfer(
        &self,
        source_id: AccountId,
        destination_id: AccountId,
        amount: &BigDecimal,
    ) -> Result<Transaction, TransactionError> {
        match self {
            TransactionProcessor::Transfer(p) => p.process(source_id, destination_id, amount).await,
            other => Err(TransactionError::UnsupportedOperation(format!(
                "{} is a single-account operation; use process_single_account",
                other.kind()
            ))),
        }
    }
}

impl fmt::Debug for TransactionProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransactionProcessor")
            .field(&self.kind())
            .finish()
    }
}
