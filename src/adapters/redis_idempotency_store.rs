use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::domain::Transaction;
use crate::ports::{IdempotencyStatus, IdempotencyStore, StoreError};

pub(crate) const COMPLETED_TTL_SECS: u64 = 86400; // 24 hours
pub(crate) const PROCESSING_TTL_SECS: u64 = 300; // 5 minutes
const KEY_PREFIX: &str = "idempotency:";

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum StoredEntry {
    Processing { fingerprint: String },
    Completed {
        fingerprint: String,
        transaction: Transaction,
    },
    Parked { fingerprint: String },
}

/// Idempotency keys shared between instances through Redis.
///
/// A key is claimed with `SET NX EX`, so two concurrent requests with the
/// same key cannot both see it as new. An in-flight marker expires after
/// five minutes in case the claiming process dies. A parked key has no
/// expiry; it stays until an operator deletes it.
#[derive(Clone)]
pub struct RedisIdempotencyStore {
    redis_client: redis::Client,
}

impl RedisIdempotencyStore {
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let redis_client = redis::Client::open(redis_url)?;
        Ok(Self { redis_client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        Ok(self.redis_client.get_multiplexed_async_connection().await?)
    }
}

fn redis_key(key: &str) -> String {
    format!("{}{}", KEY_PREFIX, key)
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn begin(&self, key: &str, fingerprint: &str) -> Result<IdempotencyStatus, StoreError> {
        let mut conn = self.connection().await?;
        let redis_key = redis_key(key);
        let marker = serde_json::to_string(&StoredEntry::Processing {
            fingerprint: fingerprint.to_string(),
        })?;

        // A marker can expire between the failed SET and the GET; try again
        // once before reporting the key as busy.
        for _ in 0..2 {
            let claimed: Option<String> = redis::cmd("SET")
                .arg(&redis_key)
                .arg(&marker)
                .arg("NX")
                .arg("EX")
                .arg(PROCESSING_TTL_SECS)
                .query_async(&mut conn)
                .await?;
            if claimed.is_some() {
                return Ok(IdempotencyStatus::New);
            }

            let existing: Option<String> = conn.get(&redis_key).await?;
            match existing {
                None => continue,
                Some(value) => {
                    return match serde_json::from_str::<StoredEntry>(&value)? {
                        StoredEntry::Processing { .. } => Ok(IdempotencyStatus::Processing),
                        StoredEntry::Completed {
                            fingerprint,
                            transaction,
                        } => Ok(IdempotencyStatus::Completed {
                            fingerprint,
                            transaction,
                        }),
                        StoredEntry::Parked { fingerprint } => {
                            Ok(IdempotencyStatus::Parked { fingerprint })
                        }
                    };
                }
            }
        }

        Ok(IdempotencyStatus::Processing)
    }

    async fn complete(
        &self,
        key: &str,
        fingerprint: &str,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let entry = serde_json::to_string(&StoredEntry::Completed {
            fingerprint: fingerprint.to_string(),
            transaction: transaction.clone(),
        })?;

        let _: () = conn.set_ex(redis_key(key), entry, COMPLETED_TTL_SECS).await?;
        Ok(())
    }

    async fn release(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(redis_key(key)).await?;
        Ok(())
    }

    async fn park(&self, key: &str, fingerprint: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let entry = serde_json::to_string(&StoredEntry::Parked {
            fingerprint: fingerprint.to_string(),
        })?;

        // Plain SET drops the in-flight expiry.
        let _: () = conn.set(redis_key(key), entry).await?;
        Ok(())
    }
}
