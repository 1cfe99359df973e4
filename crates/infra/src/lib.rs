//! Infrastructure layer: configuration, persistence adapters and background jobs.

pub mod config;
pub mod jobs;
pub mod persistence;

pub use config::{ConfigError, Settings, Storage};
pub use persistence::{
    InMemoryStore, PostgresStore, Transaction, TransactionError, Transactioner,
    within_transaction, within_transaction_returning,
};
