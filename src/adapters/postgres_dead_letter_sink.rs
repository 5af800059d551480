use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::DeadLetter;
use crate::ports::{DeadLetterSink, StoreError};

/// Dead letters persisted to `compensation_dlq` for operators to resolve.
#[derive(Clone)]
pub struct PostgresDeadLetterSink {
    pool: PgPool,
}

impl PostgresDeadLetterSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterSink for PostgresDeadLetterSink {
    async fn push(&self, letter: &DeadLetter) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO compensation_dlq (
                id, operation_id, account_id, balance_delta, reason, attempts, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(letter.id)
        .bind(letter.operation_id)
        .bind(letter.account_id)
        .bind(&letter.balance_delta)
        .bind(&letter.reason)
        .bind(i32::try_from(letter.attempts).unwrap_or(i32::MAX))
        .bind(letter.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<DeadLetter>, StoreError> {
        let rows = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            SELECT id, operation_id, account_id, balance_delta, reason, attempts, created_at
            FROM compensation_dlq
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DeadLetter::from).collect())
    }
}

#[derive(sqlx::FromRow)]
struct DeadLetterRow {
    id: Uuid,
    operation_id: Uuid,
    account_id: i64,
    balance_delta: BigDecimal,
    reason: String,
    attempts: i32,
    created_at: DateTime<Utc>,
}

impl From<DeadLetterRow> for DeadLetter {
    fn from(row: DeadLetterRow) -> Self {
        DeadLetter {
            id: row.id,
            operation_id: row.operation_id,
            account_id: row.account_id,
            balance_delta: row.balance_delta,
            reason: row.reason,
            attempts: u32::try_from(row.attempts).unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}
