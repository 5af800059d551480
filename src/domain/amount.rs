use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TransactionError;

/// A strictly positive transaction amount.
///
/// The only way to obtain one is through [`Amount::new`] (or
/// [`validate_amount`]), so a processor holding an `Amount` never has to
/// re-check the sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BigDecimal", into = "BigDecimal")]
pub struct Amount(BigDecimal);

impl Amount {
    pub fn new(value: BigDecimal) -> Result<Self, TransactionError> {
        if value > BigDecimal::from(0) {
            Ok(Self(value))
        } else {
            Err(TransactionError::Validation(format!(
                "amount must be greater than 0, got {}",
                value
            )))
        }
    }

    pub fn value(&self) -> &BigDecimal {
        &self.0
    }

    pub fn into_inner(self) -> BigDecimal {
        self.0
    }
}

impl TryFrom<BigDecimal> for Amount {
    type Error = TransactionError;

    fn try_from(value: BigDecimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for BigDecimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Precondition shared by every processor. Pure; must run before any
/// remote call so an invalid request never mutates state.
pub fn validate_amount(amount: &BigDecimal) -> Result<Amount, TransactionError> {
    Amount::new(amount.clone())
}
