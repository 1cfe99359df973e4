use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use mailman_core::{CustomerId, MailingEntryId, MailingId};
use mailman_mailing::{
    Customer, CustomerRepository, MailingEntry, MailingEntryRepository, NewCustomer,
    NewMailingEntry, RepositoryError,
};

use super::{Transaction, Transactioner, exactly_one, exactly_one_affected};

#[derive(Debug, Clone, Default)]
struct Tables {
    customers: Vec<Customer>,
    mailing_entries: Vec<MailingEntry>,
    customer_seq: i64,
    mailing_entry_seq: i64,
}

/// Store kept in process memory, for development and tests.
///
/// Transactions are serialised: opening one waits until the previous one
/// finished. Changes are made to a private copy of the tables that replaces
/// the shared ones on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<AsyncMutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct OpenTransaction {
    committed: OwnedMutexGuard<Tables>,
    working: Tables,
}

type Slot = Arc<Mutex<Option<OpenTransaction>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<OpenTransaction>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Repository over the working copy of one in-memory transaction.
pub struct InMemoryRepository {
    slot: Slot,
}

impl InMemoryRepository {
    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, RepositoryError> {
        let guard = lock(&self.slot);
        let open = guard.as_ref().ok_or(RepositoryError::TransactionClosed)?;
        Ok(f(&open.working))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut guard = lock(&self.slot);
        let open = guard.as_mut().ok_or(RepositoryError::TransactionClosed)?;
        f(&mut open.working)
    }

    fn entries_where(
        &self,
        keep: impl Fn(&MailingEntry) -> bool,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        self.read(|t| {
            t.mailing_entries
                .iter()
                .filter(|e| keep(*e))
                .cloned()
                .collect()
        })
    }

    fn one_customer(
        &self,
        query: &'static str,
        matches: impl Fn(&Customer) -> bool,
    ) -> Result<Customer, RepositoryError> {
        let found: Vec<Customer> = self.read(|t| {
            t.customers.iter().filter(|c| matches(*c)).cloned().collect()
        })?;
        exactly_one(query, found)
    }
}

fn delete_one<T>(
    query: &'static str,
    rows: &mut Vec<T>,
    matches: impl Fn(&T) -> bool,
) -> Result<(), RepositoryError> {
    let before = rows.len();
    rows.retain(|row| !matches(row));
    exactly_one_affected(query, (before - rows.len()) as u64)
}

#[async_trait]
impl CustomerRepository for InMemoryRepository {
    async fn find_customer_by_id(&self, id: CustomerId) -> Result<Customer, RepositoryError> {
        self.one_customer("find customer by id", |c| c.id == id)
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Customer, RepositoryError> {
        self.one_customer("find customer by email", |c| c.email == email)
    }

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, RepositoryError> {
        self.write(|t| {
            if t.customers.iter().any(|c| c.email == customer.email) {
                return Err(RepositoryError::backend(
                    "insert customer",
                    "duplicate value of unique column email",
                ));
            }
            t.customer_seq += 1;
            let customer = Customer {
                id: CustomerId::new(t.customer_seq),
                email: customer.email,
            };
            t.customers.push(customer.clone());
            Ok(customer)
        })
    }

    async fn delete_customer_by_id(&self, id: CustomerId) -> Result<(), RepositoryError> {
        self.write(|t| {
            if t.mailing_entries.iter().any(|e| e.customer_id == id) {
                return Err(RepositoryError::backend(
                    "delete customer",
                    "customer is still referenced by mailing entries",
                ));
            }
            delete_one("delete customer", &mut t.customers, |c| c.id == id)
        })
    }
}

#[async_trait]
impl MailingEntryRepository for InMemoryRepository {
    async fn find_mailing_entries_by_mailing_id(
        &self,
        mailing_id: MailingId,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        self.entries_where(|e| e.mailing_id == mailing_id)
    }

    async fn find_mailing_entries_older_than(
        &self,
        inserted_before: DateTime<Utc>,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        self.entries_where(|e| e.insert_time < inserted_before)
    }

    async fn find_mailing_entries_by_mailing_id_older_than(
        &self,
        mailing_id: MailingId,
        inserted_before: DateTime<Utc>,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        self.entries_where(|e| e.mailing_id == mailing_id && e.insert_time < inserted_before)
    }

    async fn find_mailing_entries_by_customer_id(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        self.entries_where(|e| e.customer_id == customer_id)
    }

    async fn find_duplicate_mailing_entries(
        &self,
        entry: &NewMailingEntry,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        self.entries_where(|e| {
            e.customer_id == entry.customer_id
                && e.mailing_id == entry.mailing_id
                && e.title == entry.title
                && e.content == entry.content
                && e.insert_time == entry.insert_time
        })
    }

    async fn insert_mailing_entry(
        &self,
        entry: NewMailingEntry,
    ) -> Result<MailingEntry, RepositoryError> {
        self.write(|t| {
            if !t.customers.iter().any(|c| c.id == entry.customer_id) {
                return Err(RepositoryError::backend(
                    "insert mailing entry",
                    "customer_id references a missing customer",
                ));
            }
            t.mailing_entry_seq += 1;
            let entry = MailingEntry {
                id: MailingEntryId::new(t.mailing_entry_seq),
                customer_id: entry.customer_id,
                mailing_id: entry.mailing_id,
                title: entry.title,
                content: entry.content,
                insert_time: entry.insert_time,
            };
            t.mailing_entries.push(entry.clone());
            Ok(entry)
        })
    }

    async fn delete_mailing_entry_by_id(&self, id: MailingEntryId) -> Result<(), RepositoryError> {
        self.write(|t| delete_one("delete mailing entry", &mut t.mailing_entries, |e| e.id == id))
    }
}

/// Finishing side of an in-memory transaction.
pub struct InMemoryTransaction {
    slot: Slot,
}

impl InMemoryTransaction {
    fn take(&self) -> Result<OpenTransaction, RepositoryError> {
        lock(&self.slot)
            .take()
            .ok_or(RepositoryError::TransactionClosed)
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self) -> Result<(), RepositoryError> {
        let OpenTransaction {
            mut committed,
            working,
        } = self.take()?;
        *committed = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        self.take().map(drop)
    }
}

#[async_trait]
impl Transactioner for InMemoryStore {
    type Repository = InMemoryRepository;
    type Transaction = InMemoryTransaction;

    async fn transactional_repository(
        &self,
    ) -> Result<(InMemoryRepository, InMemoryTransaction), RepositoryError> {
        let committed = self.tables.clone().lock_owned().await;
        let working = committed.clone();
        let slot: Slot = Arc::new(Mutex::new(Some(OpenTransaction { committed, working })));

        Ok((
            InMemoryRepository { slot: slot.clone() },
            InMemoryTransaction { slot },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_entry(customer_id: CustomerId, mailing_id: i64) -> NewMailingEntry {
        NewMailingEntry {
            customer_id,
            mailing_id: MailingId::new(mailing_id),
            title: "title".to_string(),
            content: "content".to_string(),
            insert_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    async fn customer(repo: &InMemoryRepository, email: &str) -> Customer {
        repo.insert_customer(NewCustomer {
            email: email.to_string(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn committed_changes_are_visible_to_later_transactions() {
        let store = InMemoryStore::new();

        let (repo, tx) = store.transactional_repository().await.unwrap();
        let anna = customer(&repo, "anna@example.com").await;
        repo.insert_mailing_entry(new_entry(anna.id, 1)).await.unwrap();
        tx.commit().await.unwrap();

        let (repo, tx) = store.transactional_repository().await.unwrap();
        assert_eq!(repo.find_customer_by_email("anna@example.com").await.unwrap(), anna);
        assert_eq!(
            repo.find_mailing_entries_by_customer_id(anna.id)
                .await
                .unwrap()
                .len(),
            1
        );
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn repository_is_unusable_after_commit() {
        let store = InMemoryStore::new();
        let (repo, tx) = store.transactional_repository().await.unwrap();
        tx.commit().await.unwrap();

        let err = repo
            .find_mailing_entries_by_mailing_id(MailingId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::TransactionClosed));
    }

    #[tokio::test]
    async fn transactions_are_serialised() {
        let store = InMemoryStore::new();
        let (_repo, tx) = store.transactional_repository().await.unwrap();

        let second = tokio::spawn({
            let store = store.clone();
            async move {
                let (_repo, tx) = store.transactional_repository().await.unwrap();
                tx.rollback().await.unwrap();
            }
        });
        tokio::task::yield_now().await;
        assert!(!second.is_finished());

        tx.commit().await.unwrap();
        second.await.unwrap();
    }

    #[tokio::test]
    async fn email_is_unique() {
        let store = InMemoryStore::new();
        let (repo, _tx) = store.transactional_repository().await.unwrap();
        customer(&repo, "anna@example.com").await;

        let err = repo
            .insert_customer(NewCustomer {
                email: "anna@example.com".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Backend { .. }));
    }

    #[tokio::test]
    async fn deleting_a_missing_row_reports_no_rows() {
        let store = InMemoryStore::new();
        let (repo, _tx) = store.transactional_repository().await.unwrap();

        let err = repo
            .delete_mailing_entry_by_id(MailingEntryId::new(1))
            .await
            .unwrap_err();
        assert!(err.is_no_rows());
        let err = repo.find_customer_by_id(CustomerId::new(1)).await.unwrap_err();
        assert!(err.is_no_rows());
    }

    #[tokio::test]
    async fn duplicates_match_every_field() {
        let store = InMemoryStore::new();
        let (repo, _tx) = store.transactional_repository().await.unwrap();
        let anna = customer(&repo, "anna@example.com").await;
        let stored = repo.insert_mailing_entry(new_entry(anna.id, 1)).await.unwrap();

        let same = repo
            .find_duplicate_mailing_entries(&new_entry(anna.id, 1))
            .await
            .unwrap();
        let other_mailing = repo
            .find_duplicate_mailing_entries(&new_entry(anna.id, 2))
            .await
            .unwrap();

        assert_eq!(same, vec![stored]);
        assert!(other_mailing.is_empty());
    }
}
