use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{DeadLetter, NewTransaction, Transaction};
use super::redis_idempotency_store::{COMPLETED_TTL_SECS, PROCESSING_TTL_SECS};
use crate::ports::{DeadLetterSink, IdempotencyStatus, IdempotencyStore, StoreError, TransactionStore};

/// Transaction log kept in process memory. Lists in insertion order.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn save(&self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        let stored = transaction.into_stored(Uuid::new_v4());
        self.transactions.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_all(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.transactions.read().await.clone())
    }
}

#[derive(Debug, Clone)]
enum KeyState {
    Processing,
    Completed {
        fingerprint: String,
        transaction: Transaction,
    },
    Parked {
        fingerprint: String,
    },
}

#[derive(Debug, Clone)]
struct KeyEntry {
    state: KeyState,
    stored_at: Instant,
}

impl KeyEntry {
    fn new(state: KeyState) -> Self {
        Self {
            state,
            stored_at: Instant::now(),
        }
    }
}

/// Idempotency keys kept in process memory.
///
/// Expired entries are pruned whenever a key is claimed, with the same
/// lifetimes the Redis store uses. Parked keys never expire.
#[derive(Clone)]
pub struct InMemoryIdempotencyStore {
    keys: Arc<RwLock<HashMap<String, KeyEntry>>>,
    completed_ttl: Duration,
    processing_ttl: Duration,
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self::with_ttls(
            Duration::from_secs(COMPLETED_TTL_SECS),
            Duration::from_secs(PROCESSING_TTL_SECS),
        )
    }
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttls(completed_ttl: Duration, processing_ttl: Duration) -> Self {
        Self {
            keys: Arc::default(),
            completed_ttl,
            processing_ttl,
        }
    }

    fn is_live(&self, entry: &KeyEntry) -> bool {
        let ttl = match entry.state {
            KeyState::Processing => self.processing_ttl,
            KeyState::Completed { .. } => self.completed_ttl,
            KeyState::Parked { .. } => return true,
        };
        entry.stored_at.elapsed() < ttl
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn begin(&self, key: &str, _fingerprint: &str) -> Result<IdempotencyStatus, StoreError> {
        let mut keys = self.keys.write().await;
        keys.retain(|_, entry| self.is_live(entry));

        let Some(entry) = keys.get(key) else {
            keys.insert(key.to_string(), KeyEntry::new(KeyState::Processing));
            return Ok(IdempotencyStatus::New);
        };
        Ok(match &entry.state {
            KeyState::Processing => IdempotencyStatus::Processing,
            KeyState::Completed {
                fingerprint,
                transaction,
            } => IdempotencyStatus::Completed {
                fingerprint: fingerprint.clone(),
                transaction: transaction.clone(),
            },
            KeyState::Parked { fingerprint } => IdempotencyStatus::Parked {
                fingerprint: fingerprint.clone(),
            },
        })
    }

    async fn complete(
        &self,
        key: &str,
        fingerprint: &str,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        self.keys.write().await.insert(
            key.to_string(),
            KeyEntry::new(KeyState::Completed {
                fingerprint: fingerprint.to_string(),
                transaction: transaction.clone(),
            }),
        );
        Ok(())
    }

    async fn release(&self, key: &str) -> Result<(), StoreError> {
        self.keys.write().await.remove(key);
        Ok(())
    }

    async fn park(&self, key: &str, fingerprint: &str) -> Result<(), StoreError> {
        self.keys.write().await.insert(
            key.to_string(),
            KeyEntry::new(KeyState::Parked {
                fingerprint: fingerprint.to_string(),
            }),
        );
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryDeadLetterSink {
    letters: Arc<RwLock<Vec<DeadLetter>>>,
}

impl InMemoryDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetterSink {
    async fn push(&self, letter: &DeadLetter) -> Result<(), StoreError> {
        self.letters.write().await.push(letter.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DeadLetter>, StoreError> {
        Ok(self.letters.read().await.clone())
    }
}
