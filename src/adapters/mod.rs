//! Storage adapters for the transaction log, idempotency keys and dead
//! letters.

pub mod in_memory;
pub mod postgres_dead_letter_sink;
pub mod postgres_transaction_store;
pub mod redis_idempotency_store;

pub use in_memory::{InMemoryDeadLetterSink, InMemoryIdempotencyStore, InMemoryTransactionStore};
pub use postgres_dead_letter_sink::PostgresDeadLetterSink;
pub use postgres_transaction_store::PostgresTransactionStore;
pub use redis_idempotency_store::RedisIdempotencyStore;
