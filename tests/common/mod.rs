#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ledger_relay::adapters::{InMemoryDeadLetterSink, InMemoryTransactionStore};
use ledger_relay::domain::{
    AccountId, AccountSnapshot, AccountVersion, NewTransaction, Transaction, TransactionType,
};
use ledger_relay::ports::{AccountServiceClient, AccountServiceError, StoreError, TransactionStore};
use ledger_relay::processors::{
    CompensationPolicy, Operation, ProcessorContext, Stage, TransactionObserver,
};

pub fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

#[derive(Debug, Clone)]
struct FakeAccount {
    number: String,
    balance: BigDecimal,
    version: u64,
}

#[derive(Default)]
struct FakeState {
    accounts: HashMap<AccountId, FakeAccount>,
    adjustments: Vec<(AccountId, BigDecimal)>,
    fetches: usize,
    versioned: bool,
    /// Scripted outcomes for the next adjust calls per account; `false` fails.
    adjust_script: HashMap<AccountId, VecDeque<bool>>,
    unavailable_fetch: Vec<AccountId>,
    /// Accounts that receive a concurrent write right after the next fetch.
    interfere: HashMap<AccountId, BigDecimal>,
    /// Adjust calls per account that are applied but answered with a timeout.
    lost_acks: HashMap<AccountId, usize>,
    /// Balance another writer sets right after the next applied adjust.
    overwrite: HashMap<AccountId, BigDecimal>,
}

/// Account service double that keeps balances in memory and records every
/// adjustment it receives.
#[derive(Clone, Default)]
pub struct FakeAccountService {
    state: Arc<Mutex<FakeState>>,
}

impl FakeAccountService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out version tokens and enforces them on adjust.
    pub fn versioned() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().versioned = true;
        fake
    }

    pub fn with_account(self, id: AccountId, number: &str, balance: &str) -> Self {
        self.state.lock().unwrap().accounts.insert(
            id,
            FakeAccount {
                number: number.to_string(),
                balance: dec(balance),
                version: 1,
            },
        );
        self
    }

    pub fn balance(&self, id: AccountId) -> BigDecimal {
        self.state.lock().unwrap().accounts[&id].balance.clone()
    }

    pub fn adjustments(&self) -> Vec<(AccountId, BigDecimal)> {
        self.state.lock().unwrap().adjustments.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetches
    }

    /// Fails the next `failures` adjust calls on `id`, then lets them through.
    pub fn fail_adjust(&self, id: AccountId, failures: usize) {
        let mut state = self.state.lock().unwrap();
        let script = state.adjust_script.entry(id).or_default();
        script.extend(std::iter::repeat(false).take(failures));
    }

    /// Lets `successes` adjust calls on `id` through, then fails every
    /// following one.
    pub fn fail_adjust_after(&self, id: AccountId, successes: usize) {
        let mut state = self.state.lock().unwrap();
        let script = state.adjust_script.entry(id).or_default();
        script.extend(std::iter::repeat(true).take(successes));
        script.extend(std::iter::repeat(false).take(1000));
    }

    /// Queues explicit outcomes for the next adjust calls on `id`.
    pub fn script_adjust(&self, id: AccountId, outcomes: &[bool]) {
        let mut state = self.state.lock().unwrap();
        state
            .adjust_script
            .entry(id)
            .or_default()
            .extend(outcomes.iter().copied());
    }

    pub fn fail_fetch(&self, id: AccountId) {
        self.state.lock().unwrap().unavailable_fetch.push(id);
    }

    /// Applies the next `times` adjust calls on `id` but reports them as
    /// timed out.
    pub fn lose_ack(&self, id: AccountId, times: usize) {
        *self.state.lock().unwrap().lost_acks.entry(id).or_default() += times;
    }

    /// Simulates another writer setting `id` to `balance` right after the
    /// next adjust applied to it.
    pub fn overwrite_after_adjust(&self, id: AccountId, balance: &str) {
        self.state.lock().unwrap().overwrite.insert(id, dec(balance));
    }

    /// Simulates another writer changing `id` by `delta` right after the
    /// next read of it.
    pub fn interfere_once(&self, id: AccountId, delta: &str) {
        self.state.lock().unwrap().interfere.insert(id, dec(delta));
    }
}

#[async_trait]
impl AccountServiceClient for FakeAccountService {
    async fn fetch_account(&self, account_id: AccountId) -> Result<AccountSnapshot, AccountServiceError> {
        let mut state = self.state.lock().unwrap();
        state.fetches += 1;

        if state.unavailable_fetch.contains(&account_id) {
            return Err(AccountServiceError::Unavailable("connection refused".to_string()));
        }

        let versioned = state.versioned;
        let interference = state.interfere.remove(&account_id);
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or(AccountServiceError::NotFound(account_id))?;

        let snapshot = AccountSnapshot {
            account_id,
            account_number: account.number.clone(),
            balance: account.balance.clone(),
            account_type: Some("SAVINGS".to_string()),
            owner_id: Some(1),
            version: versioned.then(|| AccountVersion::new(account.version.to_string())),
        };

        if let Some(delta) = interference {
            account.balance = &account.balance + &delta;
            account.version += 1;
        }

        Ok(snapshot)
    }

    async fn adjust_balance(
        &self,
        account_id: AccountId,
        new_balance: &BigDecimal,
        expected_version: Option<&AccountVersion>,
    ) -> Result<(), AccountServiceError> {
        let mut state = self.state.lock().unwrap();

        let allowed = state
            .adjust_script
            .get_mut(&account_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(true);
        if !allowed {
            return Err(AccountServiceError::Unavailable("account service returned 503".to_string()));
        }

        let versioned = state.versioned;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| AccountServiceError::Unavailable("unknown account".to_string()))?;

        if versioned {
            if let Some(expected) = expected_version {
                if expected.as_str() != account.version.to_string() {
                    return Err(AccountServiceError::VersionMismatch(account_id));
                }
            }
        }

        account.balance = new_balance.clone();
        account.version += 1;
        state.adjustments.push((account_id, new_balance.clone()));

        if let Some(balance) = state.overwrite.remove(&account_id) {
            if let Some(account) = state.accounts.get_mut(&account_id) {
                account.balance = balance;
                account.version += 1;
            }
        }
        if let Some(remaining) = state.lost_acks.get_mut(&account_id).filter(|n| **n > 0) {
            *remaining -= 1;
            return Err(AccountServiceError::Unavailable("timed out".to_string()));
        }
        Ok(())
    }
}

/// Transaction store whose `save` always fails.
#[derive(Clone, Default)]
pub struct FailingTransactionStore;

#[async_trait]
impl TransactionStore for FailingTransactionStore {
    async fn save(&self, _transaction: NewTransaction) -> Result<Transaction, StoreError> {
        Err(StoreError::Unavailable("transaction store is down".to_string()))
    }

    async fn list_all(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(Vec::new())
    }
}

/// Transaction store that persists the record and then reports a failure,
/// like a commit whose acknowledgement was lost.
#[derive(Clone, Default)]
pub struct LostAckTransactionStore {
    pub inner: InMemoryTransactionStore,
}

#[async_trait]
impl TransactionStore for LostAckTransactionStore {
    async fn save(&self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        self.inner.save(transaction).await?;
        Err(StoreError::Unavailable("connection reset".to_string()))
    }

    async fn list_all(&self) -> Result<Vec<Transaction>, StoreError> {
        self.inner.list_all().await
    }
}

/// Transaction store that cannot be reached at all, not even for reads.
#[derive(Clone, Default)]
pub struct UnreachableTransactionStore;

#[async_trait]
impl TransactionStore for UnreachableTransactionStore {
    async fn save(&self, _transaction: NewTransaction) -> Result<Transaction, StoreError> {
        Err(StoreError::Unavailable("connection reset".to_string()))
    }

    async fn list_all(&self) -> Result<Vec<Transaction>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Observer that keeps a compact trace of the stages it saw.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl TransactionObserver for RecordingObserver {
    fn observe(&self, op: &Operation, stage: Stage<'_>) {
        let event = match stage {
            Stage::Started => format!("started:{}", op.kind),
            Stage::Mutated { account_id, .. } => format!("mutated:{account_id}"),
            Stage::Compensated { account_id, .. } => format!("compensated:{account_id}"),
            Stage::Completed(_) => "completed".to_string(),
            Stage::Failed(err) => format!("failed:{}", err.category().as_str()),
        };
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub accounts: FakeAccountService,
    pub store: InMemoryTransactionStore,
    pub dead_letters: InMemoryDeadLetterSink,
    pub observer: RecordingObserver,
    pub ctx: ProcessorContext,
}

pub fn no_backoff(max_attempts: u32) -> CompensationPolicy {
    CompensationPolicy {
        max_attempts,
        backoff: Duration::ZERO,
    }
}

pub fn harness(accounts: FakeAccountService) -> Harness {
    let store = InMemoryTransactionStore::new();
    harness_with_store(accounts, store.clone(), Arc::new(store))
}

pub fn harness_with_failing_store(accounts: FakeAccountService) -> Harness {
    harness_with_store(
        accounts,
        InMemoryTransactionStore::new(),
        Arc::new(FailingTransactionStore),
    )
}

pub fn harness_with_store(
    accounts: FakeAccountService,
    store: InMemoryTransactionStore,
    backing: Arc<dyn TransactionStore>,
) -> Harness {
    let dead_letters = InMemoryDeadLetterSink::new();
    let observer = RecordingObserver::default();
    let ctx = ProcessorContext::new(Arc::new(accounts.clone()), backing, Arc::new(dead_letters.clone()))
        .with_observer(Arc::new(observer.clone()))
        .with_compensation(no_backoff(3));

    Harness {
        accounts,
        store,
        dead_letters,
        observer,
        ctx,
    }
}

pub fn assert_kind(tx: &Transaction, kind: TransactionType) {
    assert_eq!(tx.kind, kind);
}
