use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use mailman_lifecycle::{Scheduler, ShutdownHandle};
use mailman_mailing::StaleEntryRemover;
use mailman_observability::OperationContext;

use crate::persistence::{Transactioner, within_transaction_returning};

pub const STALE_ENTRY_CLEANUP: &str = "stale mailing entry cleanup";

/// Periodically delete stale mailing entries (and customers left without
/// entries) until `handle` is cancelled. Each run is one transaction.
pub async fn run_stale_entry_cleanup<T>(
    transactioner: Arc<T>,
    staleness_threshold: Duration,
    period: Duration,
    handle: ShutdownHandle,
) where
    T: Transactioner + 'static,
{
    let scheduler = Scheduler::new(STALE_ENTRY_CLEANUP, move |_ctx: OperationContext| {
        let transactioner = Arc::clone(&transactioner);
        async move {
            let removed = within_transaction_returning(&*transactioner, |repository| async move {
                StaleEntryRemover::new(&repository, staleness_threshold)
                    .remove()
                    .await
                    .map_err(anyhow::Error::from)
            })
            .await?;

            info!(removed, "stale mailing entry cleanup finished");
            Ok::<(), anyhow::Error>(())
        }
    });

    scheduler.run_periodically(handle, period).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mailman_core::MailingId;
    use mailman_lifecycle::ShutdownCoordinator;
    use mailman_mailing::{CustomerRepository, MailingEntryRepository, NewCustomer, NewMailingEntry};

    use crate::persistence::{InMemoryStore, Transaction};

    async fn seed(store: &InMemoryStore, age: chrono::Duration) {
        let (repo, tx) = store.transactional_repository().await.unwrap();
        let customer = repo
            .insert_customer(NewCustomer {
                email: format!("{}@example.com", age.num_seconds()),
            })
            .await
            .unwrap();
        repo.insert_mailing_entry(NewMailingEntry {
            customer_id: customer.id,
            mailing_id: MailingId::new(1),
            title: "title".to_string(),
            content: "content".to_string(),
            insert_time: Utc::now() - age,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    async fn remaining(store: &InMemoryStore) -> usize {
        let (repo, tx) = store.transactional_repository().await.unwrap();
        let entries = repo
            .find_mailing_entries_by_mailing_id(MailingId::new(1))
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        entries.len()
    }

    #[tokio::test]
    async fn removes_stale_entries_each_period_until_shutdown() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, chrono::Duration::hours(3)).await;
        seed(&store, chrono::Duration::minutes(5)).await;

        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let handle = coordinator.new_handle(STALE_ENTRY_CLEANUP).unwrap();
        let job = tokio::spawn(run_stale_entry_cleanup(
            Arc::clone(&store),
            Duration::from_secs(2 * 60 * 60),
            Duration::from_millis(20),
            handle.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(remaining(&store).await, 1);

        coordinator.cancel().await;
        job.await.unwrap();
        assert!(handle.has_notified());
    }
}
