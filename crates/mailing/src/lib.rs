//! Mailing domain: customers, mailing entries and the services operating on them.
//!
//! Services never open transactions themselves. They are handed a repository
//! that is already scoped to one (see `mailman-infra::persistence`), so
//! everything a single service call does commits or rolls back together.

pub mod creator;
pub mod customer;
pub mod email;
pub mod error;
pub mod model;
pub mod remover;
pub mod repository;
pub mod sender;
pub mod stale_remover;

#[cfg(test)]
mod test_support;

pub use creator::MailingEntryCreator;
pub use customer::CustomerCreator;
pub use email::{EmailError, Emailer, LoggingEmailer};
pub use error::MailingError;
pub use model::{Customer, MailingEntry, MailingEntryDraft, NewCustomer, NewMailingEntry};
pub use remover::MailingEntryRemover;
pub use repository::{CustomerRepository, MailingEntryRepository, Repository, RepositoryError};
pub use sender::MailingEntrySender;
pub use stale_remover::StaleEntryRemover;
