//! Storage ports used by the mailing services.
//!
//! Implementations live in `mailman-infra` (Postgres and in-memory). A
//! repository handed out by a transactioner is only valid for the duration of
//! its transaction: once the transaction is committed or rolled back every
//! call fails with [`RepositoryError::TransactionClosed`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use mailman_core::{CustomerId, MailingEntryId, MailingId};

use crate::model::{Customer, MailingEntry, NewCustomer, NewMailingEntry};

/// Boxed error of an underlying storage driver.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A query returned or affected 0 rows but at least 1 was expected.
    #[error("{query}: no row matched the query")]
    NoRows { query: &'static str },

    /// A query returned or affected more rows than expected.
    #[error("{query}: more rows than expected matched the query")]
    TooManyRows { query: &'static str },

    /// The repository was used after its transaction was committed or rolled back.
    #[error("transaction is already finished")]
    TransactionClosed,

    /// Failure reported by the storage driver.
    #[error("{operation}: {source}")]
    Backend {
        operation: &'static str,
        source: BackendError,
    },
}

impl RepositoryError {
    pub fn backend(operation: &'static str, source: impl Into<BackendError>) -> Self {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }

    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows { .. })
    }
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_customer_by_id(&self, id: CustomerId) -> Result<Customer, RepositoryError>;

    async fn find_customer_by_email(&self, email: &str) -> Result<Customer, RepositoryError>;

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, RepositoryError>;

    async fn delete_customer_by_id(&self, id: CustomerId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MailingEntryRepository: Send + Sync {
    async fn find_mailing_entries_by_mailing_id(
        &self,
        mailing_id: MailingId,
    ) -> Result<Vec<MailingEntry>, RepositoryError>;

    /// Entries inserted strictly before `inserted_before`.
    async fn find_mailing_entries_older_than(
        &self,
        inserted_before: DateTime<Utc>,
    ) -> Result<Vec<MailingEntry>, RepositoryError>;

    async fn find_mailing_entries_by_mailing_id_older_than(
        &self,
        mailing_id: MailingId,
        inserted_before: DateTime<Utc>,
    ) -> Result<Vec<MailingEntry>, RepositoryError>;

    async fn find_mailing_entries_by_customer_id(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<MailingEntry>, RepositoryError>;

    /// Entries identical to `entry` in every field but the id.
    async fn find_duplicate_mailing_entries(
        &self,
        entry: &NewMailingEntry,
    ) -> Result<Vec<MailingEntry>, RepositoryError>;

    async fn insert_mailing_entry(
        &self,
        entry: NewMailingEntry,
    ) -> Result<MailingEntry, RepositoryError>;

    async fn delete_mailing_entry_by_id(&self, id: MailingEntryId) -> Result<(), RepositoryError>;
}

/// Everything a storage backend implements.
pub trait Repository: CustomerRepository + MailingEntryRepository {}

impl<T> Repository for T where T: CustomerRepository + MailingEntryRepository {}
