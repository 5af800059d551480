use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Amount;

/// Identifier the remote account service uses for an account.
pub type AccountId = i64;

/// Opaque revision marker handed out by the account service.
///
/// Sent back on the next balance adjustment so a write based on a stale
/// read is rejected instead of silently overwriting a concurrent change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountVersion(String);

impl AccountVersion {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point-in-time read of a remote account. Never cached between operations.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub account_number: String,
    pub balance: BigDecimal,
    pub account_type: Option<String>,
    pub owner_id: Option<i64>,
    pub version: Option<AccountVersion>,
}

impl AccountSnapshot {
    pub fn covers(&self, amount: &Amount) -> bool {
        self.balance >= *amount.value()
    }
}
