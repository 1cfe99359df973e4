//! Transactional persistence.
//!
//! A [`Transactioner`] hands out a repository bound to a freshly opened
//! transaction together with the [`Transaction`] that finishes it. The
//! runner in [`transaction`] is the only code that commits or rolls back.

mod in_memory;
mod postgres;
mod transaction;

use async_trait::async_trait;

use mailman_mailing::{Repository, RepositoryError};

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use transaction::{TransactionError, within_transaction, within_transaction_returning};

/// Finishing side of an open transaction.
#[async_trait]
pub trait Transaction: Send {
    async fn commit(self) -> Result<(), RepositoryError>;

    async fn rollback(self) -> Result<(), RepositoryError>;
}

/// Source of transaction-scoped repositories.
#[async_trait]
pub trait Transactioner: Send + Sync {
    type Repository: Repository + 'static;
    type Transaction: Transaction + 'static;

    /// Open a transaction and return a repository scoped to it.
    async fn transactional_repository(
        &self,
    ) -> Result<(Self::Repository, Self::Transaction), RepositoryError>;
}

fn exactly_one<T>(query: &'static str, mut rows: Vec<T>) -> Result<T, RepositoryError> {
    match rows.len() {
        0 => Err(RepositoryError::NoRows { query }),
        1 => Ok(rows.remove(0)),
        _ => Err(RepositoryError::TooManyRows { query }),
    }
}

fn exactly_one_affected(query: &'static str, affected: u64) -> Result<(), RepositoryError> {
    match affected {
        0 => Err(RepositoryError::NoRows { query }),
        1 => Ok(()),
        _ => Err(RepositoryError::TooManyRows { query }),
    }
}
