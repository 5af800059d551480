//! Domain types for the transaction core.
//! Framework-agnostic: nothing in here knows about HTTP, Postgres or Redis.

pub mod account;
pub mod amount;
pub mod dead_letter;
pub mod error;
pub mod transaction;

pub use account::{AccountId, AccountSnapshot, AccountVersion};
pub use amount::{validate_amount, Amount};
pub use dead_letter::DeadLetter;
pub use error::{ErrorCategory, TransactionError};
pub use transaction::{NewTransaction, Transaction, TransactionType};
