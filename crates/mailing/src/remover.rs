use tracing::info;

use mailman_core::{DomainError, MailingEntryId};

use crate::error::MailingError;
use crate::repository::MailingEntryRepository;

pub struct MailingEntryRemover<'a, R: ?Sized> {
    repository: &'a R,
}

impl<'a, R> MailingEntryRemover<'a, R>
where
    R: MailingEntryRepository + ?Sized,
{
    pub fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    /// Delete one entry; an unknown id is reported as `NotFound`.
    pub async fn remove(&self, id: MailingEntryId) -> Result<(), MailingError> {
        info!(mailing_entry_id = %id, "deleting mailing entry");
        match self.repository.delete_mailing_entry_by_id(id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_no_rows() => Err(DomainError::not_found(format!(
                "mailing entry with ID {id} doesn't exist"
            ))
            .into()),
            Err(e) => Err(MailingError::repository(
                format!("error deleting mailing entry {id}"),
                e,
            )),
        }
    }
}
