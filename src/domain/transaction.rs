//! Transaction domain entity.
//! Immutable record of a completed deposit, withdrawal or transfer.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Amount, TransactionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    #[serde(alias = "SAVING")]
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionType {
    pub const ALL: [TransactionType; 3] = [
        TransactionType::Deposit,
        TransactionType::Withdrawal,
        TransactionType::Transfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = TransactionError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "DEPOSIT" | "SAVING" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            "TRANSFER" => Ok(TransactionType::Transfer),
            _ => Err(TransactionError::UnsupportedType(tag.to_string())),
        }
    }
}

/// A transaction that has not been persisted yet. Only a store can turn it
/// into a [`Transaction`], because only the store assigns identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub kind: TransactionType,
    pub amount: Amount,
    pub timestamp: DateTime<Utc>,
    pub origin_account: String,
    pub destination_account: Option<String>,
}

impl NewTransaction {
    pub fn new(
        kind: TransactionType,
        amount: Amount,
        origin_account: String,
        destination_account: Option<String>,
    ) -> Self {
        Self {
            kind,
            amount,
            // Postgres keeps microseconds.
            timestamp: Utc::now().trunc_subsecs(6),
            origin_account,
            destination_account,
        }
    }

    pub fn into_stored(self, id: Uuid) -> Transaction {
        Transaction {
            id,
            kind: self.kind,
            amount: self.amount,
            timestamp: self.timestamp,
            origin_account: self.origin_account,
            destination_account: self.destination_account,
        }
    }

    /// True when `stored` is this record after a store persisted it.
    pub fn matches(&self, stored: &Transaction) -> bool {
        self.kind == stored.kind
            && self.amount == stored.amount
            && self.timestamp == stored.timestamp
            && self.origin_account == stored.origin_account
            && self.destination_account == stored.destination_account
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Amount,
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    pub origin_account: String,
    pub destination_account: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    #[test]
    fn test_parse_known_tags() {
        assert_eq!("deposit".parse::<TransactionType>().unwrap(), TransactionType::Deposit);
        assert_eq!("SAVING".parse::<TransactionType>().unwrap(), TransactionType::Deposit);
        assert_eq!(" Withdrawal ".parse::<TransactionType>().unwrap(), TransactionType::Withdrawal);
        assert_eq!("TRANSFER".parse::<TransactionType>().unwrap(), TransactionType::Transfer);
    }

    #[test]
    fn test_parse_unknown_tag() {
        let err = "chargeback".parse::<TransactionType>().unwrap_err();
        assert!(matches!(err, TransactionError::UnsupportedType(tag) if tag == "chargeback"));
    }

    #[test]
    fn test_transaction_wire_format() {
        let amount = Amount::new(BigDecimal::from(100)).unwrap();
        let tx = NewTransaction::new(
            TransactionType::Transfer,
            amount,
            "ACC-1".to_string(),
            Some("ACC-2".to_string()),
        )
        .into_stored(Uuid::nil());

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "TRANSFER");
        assert_eq!(json["amount"], "100");
        assert_eq!(json["originAccount"], "ACC-1");
        assert_eq!(json["destinationAccount"], "ACC-2");
        assert!(json["date"].is_string());

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn test_matches_only_its_own_stored_form() {
        let amount = Amount::new(BigDecimal::from(5)).unwrap();
        let new_tx = NewTransaction::new(TransactionType::Deposit, amount, "ACC-1".to_string(), None);
        let stored = new_tx.clone().into_stored(Uuid::new_v4());
        assert!(new_tx.matches(&stored));

        let mut other = stored.clone();
        other.origin_account = "ACC-2".to_string();
        assert!(!new_tx.matches(&other));
    }

    #[test]
    fn test_saving_alias_deserializes_as_deposit() {
        let kind: TransactionType = serde_json::from_str("\"SAVING\"").unwrap();
        assert_eq!(kind, TransactionType::Deposit);
    }
}
