use bigdecimal::BigDecimal;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AccountId;

/// A compensating balance change that could not be applied.
///
/// `balance_delta` is what still has to be added to the account's current
/// balance to undo the operation's effect on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub id: Uuid,
    pub operation_id: Uuid,
    pub account_id: AccountId,
    pub balance_delta: BigDecimal,
    pub reason: String,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(
        operation_id: Uuid,
        account_id: AccountId,
        balance_delta: BigDecimal,
        reason: String,
        attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_id,
            account_id,
            balance_delta,
            reason,
            attempts,
            created_at: Utc::now().trunc_subsecs(6),
        }
    }
}
