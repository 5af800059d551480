//! Postgres implementation of TransactionStore.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Amount, NewTransaction, Transaction, TransactionType};
use crate::ports::{StoreError, TransactionStore};

/// Postgres-backed, append-only transaction log.
#[derive(Clone)]
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn save(&self, tx: NewTransaction) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (
                id, transaction_type, amount, created_at, origin_account, destination_account
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, transaction_type, amount, created_at, origin_account, destination_account
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tx.kind.as_str())
        .bind(tx.amount.value())
        .bind(tx.timestamp)
        .bind(&tx.origin_account)
        .bind(&tx.destination_account)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn list_all(&self) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, transaction_type, amount, created_at, origin_account, destination_account
            FROM transactions
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn find_recorded(&self, tx: &NewTransaction) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, transaction_type, amount, created_at, origin_account, destination_account
            FROM transactions
            WHERE transaction_type = $1
              AND amount = $2
              AND created_at = $3
              AND origin_account = $4
              AND destination_account IS NOT DISTINCT FROM $5
            ORDER BY seq
            LIMIT 1
            "#,
        )
        .bind(tx.kind.as_str())
        .bind(tx.amount.value())
        .bind(tx.timestamp)
        .bind(&tx.origin_account)
        .bind(&tx.destination_account)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }
}

/// Internal row type for sqlx mapping.
#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    transaction_type: String,
    amount: BigDecimal,
    created_at: DateTime<Utc>,
    origin_account: String,
    destination_account: Option<String>,
}

impl TransactionRow {
    fn into_domain(self) -> Result<Transaction, StoreError> {
        let kind: TransactionType = self
            .transaction_type
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("transaction {} has type {}", self.id, self.transaction_type)))?;
        let amount = Amount::new(self.amount)
            .map_err(|e| StoreError::Corrupt(format!("transaction {}: {e}", self.id)))?;

        Ok(Transaction {
            id: self.id,
            kind,
            amount,
            timestamp: self.created_at,
            origin_account: self.origin_account,
            destination_account: self.destination_account,
        })
    }
}
