use tracing::{debug, info};

use mailman_core::{DomainError, MailingId};

use crate::email::Emailer;
use crate::error::MailingError;
use crate::model::MailingEntry;
use crate::repository::Repository;

/// Sends mailing entries and deletes them once sent.
pub struct MailingEntrySender<'a, R: ?Sized, M: ?Sized> {
    repository: &'a R,
    emailer: &'a M,
}

impl<'a, R, M> MailingEntrySender<'a, R, M>
where
    R: Repository + ?Sized,
    M: Emailer + ?Sized,
{
    pub fn new(repository: &'a R, emailer: &'a M) -> Self {
        Self { repository, emailer }
    }

    /// Send every entry of a mailing. A mailing without entries is `NotFound`.
    ///
    /// Stops at the first failure; run it inside a transaction so the
    /// deletions of already-sent entries are rolled back with it.
    pub async fn send_mailing(&self, mailing_id: MailingId) -> Result<usize, MailingError> {
        let entries = self
            .repository
            .find_mailing_entries_by_mailing_id(mailing_id)
            .await
            .map_err(|e| MailingError::repository("error listing mailing entries", e))?;

        debug!(count = entries.len(), %mailing_id, "found mailing entries");
        if entries.is_empty() {
            return Err(DomainError::not_found("no mailing entries to send").into());
        }

        for entry in &entries {
            self.send(entry).await?;
        }
        Ok(entries.len())
    }

    /// Send one entry to its customer and delete it.
    pub async fn send(&self, entry: &MailingEntry) -> Result<(), MailingError> {
        let customer = self
            .repository
            .find_customer_by_id(entry.customer_id)
            .await
            .map_err(|e| {
                MailingError::repository(
                    format!(
                        "error finding customer {} for mailing entry {}",
                        entry.customer_id, entry.id
                    ),
                    e,
                )
            })?;

        debug!(mailing_entry_id = %entry.id, "sending mailing entry");
        self.emailer
            .send(&customer.email, &entry.title, &entry.content)
            .await
            .map_err(|e| {
                MailingError::email(
                    format!(
                        "error sending mailing entry {} to customer {}",
                        entry.id, entry.customer_id
                    ),
                    e,
                )
            })?;

        info!(mailing_entry_id = %entry.id, "deleting sent mailing entry");
        self.repository
            .delete_mailing_entry_by_id(entry.id)
            .await
            .map_err(|e| {
                MailingError::repository(format!("error deleting mailing entry {}", entry.id), e)
            })
    }
}
