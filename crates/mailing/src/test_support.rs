//! In-process doubles for service tests.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mailman_core::{CustomerId, MailingEntryId, MailingId};

use crate::email::{EmailError, Emailer};
use crate::model::{Customer, MailingEntry, NewCustomer, NewMailingEntry};
use crate::repository::{CustomerRepository, MailingEntryRepository, RepositoryError};

#[derive(Default)]
struct State {
    customers: Vec<Customer>,
    entries: Vec<MailingEntry>,
    last_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Default)]
pub struct FakeRepository {
    state: Mutex<State>,
}

impl FakeRepository {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.state().customers.clone()
    }

    pub fn entries(&self) -> Vec<MailingEntry> {
        self.state().entries.clone()
    }

    pub fn seed_customer(&self, email: &str) -> Customer {
        let mut state = self.state();
        let customer = Customer {
            id: CustomerId::new(state.next_id()),
            email: email.to_string(),
        };
        state.customers.push(customer.clone());
        customer
    }

    pub fn seed_entry(
        &self,
        customer_id: CustomerId,
        mailing_id: i64,
        insert_time: DateTime<Utc>,
    ) -> MailingEntry {
        let mut state = self.state();
        let entry = MailingEntry {
            id: MailingEntryId::new(state.next_id()),
            customer_id,
            mailing_id: MailingId::new(mailing_id),
            title: "title".to_string(),
            content: "content".to_string(),
            insert_time,
        };
        state.entries.push(entry.clone());
        entry
    }

    fn filter_entries(&self, keep: impl Fn(&MailingEntry) -> bool) -> Vec<MailingEntry> {
        self.state().entries.iter().filter(|e| keep(*e)).cloned().collect()
    }
}

#[async_trait]
impl CustomerRepository for FakeRepository {
    async fn find_customer_by_id(&self, id: CustomerId) -> Result<Customer, RepositoryError> {
        self.state()
            .customers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(RepositoryError::NoRows {
                query: "find customer by id",
            })
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Customer, RepositoryError> {
        self.state()
            .customers
            .iter()
            .find(|c| c.email == email)
            .cloned()
            .ok_or(RepositoryError::NoRows {
                query: "find customer by email",
            })
    }

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, RepositoryError> {
        Ok(self.seed_customer(&customer.email))
    }

    async fn delete_customer_by_id(&self, id: CustomerId) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let before = state.customers.len();
        state.customers.retain(|c| c.id != id);
        if state.customers.len() == before {
            return Err(RepositoryError::NoRows {
                query: "delete customer",
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MailingEntryRepository for FakeRepository {
    async fn find_mailing_entries_by_mailing_id(
        &self,
        mailing_id: MailingId,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        Ok(self.filter_entries(|e| e.mailing_id == mailing_id))
    }

    async fn find_mailing_entries_older_than(
        &self,
        inserted_before: DateTime<Utc>,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        Ok(self.filter_entries(|e| e.insert_time < inserted_before))
    }

    async fn find_mailing_entries_by_mailing_id_older_than(
        &self,
        mailing_id: MailingId,
        inserted_before: DateTime<Utc>,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        Ok(self.filter_entries(|e| e.mailing_id == mailing_id && e.insert_time < inserted_before))
    }

    async fn find_mailing_entries_by_customer_id(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        Ok(self.filter_entries(|e| e.customer_id == customer_id))
    }

    async fn find_duplicate_mailing_entries(
        &self,
        entry: &NewMailingEntry,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        Ok(self.filter_entries(|e| {
            e.customer_id == entry.customer_id
                && e.mailing_id == entry.mailing_id
                && e.title == entry.title
                && e.content == entry.content
                && e.insert_time == entry.insert_time
        }))
    }

    async fn insert_mailing_entry(
        &self,
        entry: NewMailingEntry,
    ) -> Result<MailingEntry, RepositoryError> {
        let mut state = self.state();
        let entry = MailingEntry {
            id: MailingEntryId::new(state.next_id()),
            customer_id: entry.customer_id,
            mailing_id: entry.mailing_id,
            title: entry.title,
            content: entry.content,
            insert_time: entry.insert_time,
        };
        state.entries.push(entry.clone());
        Ok(entry)
    }

    async fn delete_mailing_entry_by_id(&self, id: MailingEntryId) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let before = state.entries.len();
        state.entries.retain(|e| e.id != id);
        if state.entries.len() == before {
            return Err(RepositoryError::NoRows {
                query: "delete mailing entry",
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEmailer {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingEmailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Emailer for RecordingEmailer {
    async fn send(&self, email_address: &str, _title: &str, _content: &str) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError("smtp unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(email_address.to_string());
        Ok(())
    }
}
