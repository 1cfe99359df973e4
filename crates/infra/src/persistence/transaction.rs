use std::fmt::Display;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, error};

use mailman_mailing::RepositoryError;

use super::{Transaction, Transactioner};

/// Failures of the runner itself, as opposed to the unit of work.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("error creating a transaction")]
    Begin(#[source] RepositoryError),

    #[error("error committing transaction")]
    Commit(#[source] RepositoryError),
}

/// Run `unit_of_work` inside a transaction and return its value.
///
/// The transaction is committed when the unit of work succeeds and rolled
/// back when it fails or panics. Errors are returned unchanged and panics are
/// resumed with their original payload once the rollback was attempted. A
/// failed rollback is only logged. If no transaction can be opened the unit
/// of work is never invoked.
pub async fn within_transaction_returning<T, V, E, F, Fut>(
    transactioner: &T,
    unit_of_work: F,
) -> Result<V, E>
where
    T: Transactioner + ?Sized,
    F: FnOnce(T::Repository) -> Fut,
    Fut: Future<Output = Result<V, E>>,
    E: From<TransactionError> + Display,
{
    let (repository, transaction) = transactioner
        .transactional_repository()
        .await
        .map_err(TransactionError::Begin)?;

    let outcome = AssertUnwindSafe(async move { unit_of_work(repository).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(value)) => {
            transaction
                .commit()
                .await
                .map_err(TransactionError::Commit)?;
            debug!("transaction committed");
            Ok(value)
        }
        Ok(Err(err)) => {
            debug!(error = %err, "unit of work failed, rolling back");
            rollback(transaction).await;
            Err(err)
        }
        Err(payload) => {
            error!(
                panic = mailman_lifecycle::panic_message(&*payload),
                "unit of work panicked, rolling back"
            );
            rollback(transaction).await;
            panic::resume_unwind(payload)
        }
    }
}

/// [`within_transaction_returning`] for units of work without a value.
pub async fn within_transaction<T, E, F, Fut>(transactioner: &T, unit_of_work: F) -> Result<(), E>
where
    T: Transactioner + ?Sized,
    F: FnOnce(T::Repository) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: From<TransactionError> + Display,
{
    within_transaction_returning(transactioner, unit_of_work).await
}

async fn rollback<X: Transaction>(transaction: X) {
    if let Err(err) = transaction.rollback().await {
        error!(error = %err, "error rolling back transaction");
    }
}
