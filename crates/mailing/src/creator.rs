use tracing::{debug, info};

use mailman_core::DomainError;

use crate::customer::CustomerCreator;
use crate::error::MailingError;
use crate::model::{Customer, MailingEntry, MailingEntryDraft, NewMailingEntry};
use crate::repository::Repository;

/// Creates mailing entries, resolving (or creating) their customer first.
pub struct MailingEntryCreator<'a, R: ?Sized> {
    repository: &'a R,
}

impl<'a, R> MailingEntryCreator<'a, R>
where
    R: Repository + ?Sized,
{
    pub fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    /// Create an entry from a client draft.
    ///
    /// The same entry can't be created twice: an identical existing entry
    /// (same customer, mailing, title, content and insert time) is rejected
    /// with `BadInput`.
    pub async fn create(&self, draft: MailingEntryDraft) -> Result<MailingEntry, MailingError> {
        draft.validate()?;

        let customer = self.get_or_create_customer(&draft.email).await?;
        let entry = NewMailingEntry {
            customer_id: customer.id,
            mailing_id: draft.mailing_id,
            title: draft.title,
            content: draft.content,
            insert_time: draft.insert_time,
        };

        self.assert_mailing_entry_does_not_exist(&entry).await?;
        self.insert(entry).await
    }

    async fn get_or_create_customer(&self, email: &str) -> Result<Customer, MailingError> {
        match self.repository.find_customer_by_email(email).await {
            Ok(customer) => {
                debug!(customer_id = %customer.id, "customer already exists");
                Ok(customer)
            }
            Err(e) if e.is_no_rows() => {
                debug!("customer doesn't exist, creating");
                CustomerCreator::new(self.repository)
                    .create_from_email(email)
                    .await
            }
            Err(e) => Err(MailingError::repository("error finding customer by email", e)),
        }
    }

    async fn assert_mailing_entry_does_not_exist(
        &self,
        entry: &NewMailingEntry,
    ) -> Result<(), MailingError> {
        let found = self
            .repository
            .find_duplicate_mailing_entries(entry)
            .await
            .map_err(|e| {
                MailingError::repository("error checking if mailing entry already exists", e)
            })?;

        match found.first() {
            None => {
                debug!("mailing entry doesn't exist");
                Ok(())
            }
            Some(existing) => {
                debug!(
                    count = found.len(),
                    existing_id = %existing.id,
                    "found existing mailing entries"
                );
                Err(DomainError::bad_input("this mailing entry already exists").into())
            }
        }
    }

    async fn insert(&self, entry: NewMailingEntry) -> Result<MailingEntry, MailingError> {
        debug!(
            mailing_id = %entry.mailing_id,
            insert_time = %entry.insert_time,
            customer_id = %entry.customer_id,
            "creating mailing entry"
        );
        let entry = self
            .repository
            .insert_mailing_entry(entry)
            .await
            .map_err(|e| MailingError::repository("error creating mailing entry", e))?;

        info!(mailing_entry_id = %entry.id, "created mailing entry");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mailman_core::MailingId;

    use crate::test_support::FakeRepository;

    fn draft() -> MailingEntryDraft {
        MailingEntryDraft {
            mailing_id: MailingId::new(17),
            email: "test@test.com".to_string(),
            title: "test email".to_string(),
            content: "test content".to_string(),
            insert_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn uses_the_existing_customer() {
        let repo = FakeRepository::default();
        let existing = repo.seed_customer("test@test.com");

        let entry = MailingEntryCreator::new(&repo).create(draft()).await.unwrap();

        assert_eq!(entry.customer_id, existing.id);
        assert_eq!(entry.mailing_id, MailingId::new(17));
        assert_eq!(entry.title, "test email");
        assert_eq!(repo.customers().len(), 1);
        assert_eq!(repo.entries(), vec![entry]);
    }

    #[tokio::test]
    async fn creates_the_customer_when_missing() {
        let repo = FakeRepository::default();

        let entry = MailingEntryCreator::new(&repo).create(draft()).await.unwrap();

        let customers = repo.customers();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].email, "test@test.com");
        assert_eq!(entry.customer_id, customers[0].id);
    }

    #[tokio::test]
    async fn rejects_duplicate_entries() {
        let repo = FakeRepository::default();
        let creator = MailingEntryCreator::new(&repo);
        creator.create(draft()).await.unwrap();

        let err = creator.create(draft()).await.unwrap_err();

        assert_eq!(
            err.as_domain(),
            Some(&DomainError::bad_input("this mailing entry already exists"))
        );
        assert_eq!(repo.entries().len(), 1);
    }

    #[tokio::test]
    async fn same_content_at_another_time_is_not_a_duplicate() {
        let repo = FakeRepository::default();
        let creator = MailingEntryCreator::new(&repo);
        creator.create(draft()).await.unwrap();

        let later = MailingEntryDraft {
            insert_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 1).unwrap(),
            ..draft()
        };
        creator.create(later).await.unwrap();

        assert_eq!(repo.entries().len(), 2);
        assert_eq!(repo.customers().len(), 1);
    }

    #[tokio::test]
    async fn invalid_draft_touches_nothing() {
        let repo = FakeRepository::default();
        let invalid = MailingEntryDraft {
            email: "not-an-email".to_string(),
            ..draft()
        };

        let err = MailingEntryCreator::new(&repo).create(invalid).await.unwrap_err();

        assert!(matches!(err.as_domain(), Some(DomainError::BadInput(_))));
        assert!(repo.customers().is_empty());
        assert!(repo.entries().is_empty());
    }
}
