use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use mailman_core::{CustomerId, MailingId};

use crate::error::MailingError;
use crate::model::MailingEntry;
use crate::repository::Repository;

/// Removes mailing entries older than a staleness threshold, together with
/// customers that are left without any entries.
pub struct StaleEntryRemover<'a, R: ?Sized> {
    repository: &'a R,
    staleness_threshold: Duration,
}

impl<'a, R> StaleEntryRemover<'a, R>
where
    R: Repository + ?Sized,
{
    pub fn new(repository: &'a R, staleness_threshold: Duration) -> Self {
        Self {
            repository,
            staleness_threshold,
        }
    }

    /// Remove every stale entry. Returns the number of removed entries.
    pub async fn remove(&self) -> Result<usize, MailingError> {
        self.remove_at(Utc::now()).await
    }

    /// Remove the stale entries of one mailing.
    pub async fn remove_by_mailing_id(&self, mailing_id: MailingId) -> Result<usize, MailingError> {
        self.remove_by_mailing_id_at(mailing_id, Utc::now()).await
    }

    pub async fn remove_at(&self, now: DateTime<Utc>) -> Result<usize, MailingError> {
        let cutoff = self.cutoff(now);
        debug!(%cutoff, "looking for stale mailing entries");
        let entries = self
            .repository
            .find_mailing_entries_older_than(cutoff)
            .await
            .map_err(|e| MailingError::repository("error listing stale mailing entries", e))?;

        self.remove_entries(&entries).await
    }

    pub async fn remove_by_mailing_id_at(
        &self,
        mailing_id: MailingId,
        now: DateTime<Utc>,
    ) -> Result<usize, MailingError> {
        let cutoff = self.cutoff(now);
        debug!(%cutoff, %mailing_id, "looking for stale mailing entries");
        let entries = self
            .repository
            .find_mailing_entries_by_mailing_id_older_than(mailing_id, cutoff)
            .await
            .map_err(|e| {
                MailingError::repository(
                    format!("error listing stale mailing entries of mailing {mailing_id}"),
                    e,
                )
            })?;

        self.remove_entries(&entries).await
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.staleness_threshold)
            .ok()
            .and_then(|threshold| now.checked_sub_signed(threshold))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    async fn remove_entries(&self, entries: &[MailingEntry]) -> Result<usize, MailingError> {
        if entries.is_empty() {
            debug!("no stale mailing entries");
            return Ok(0);
        }

        let mut customers = BTreeSet::new();
        for entry in entries {
            self.repository
                .delete_mailing_entry_by_id(entry.id)
                .await
                .map_err(|e| {
                    MailingError::repository(
                        format!("error deleting stale mailing entry {}", entry.id),
                        e,
                    )
                })?;
            customers.insert(entry.customer_id);
        }
        info!(count = entries.len(), "removed stale mailing entries");

        for customer_id in customers {
            self.remove_customer_if_unused(customer_id).await?;
        }
        Ok(entries.len())
    }

    async fn remove_customer_if_unused(&self, customer_id: CustomerId) -> Result<(), MailingError> {
        let remaining = self
            .repository
            .find_mailing_entries_by_customer_id(customer_id)
            .await
            .map_err(|e| {
                MailingError::repository(
                    format!("error listing mailing entries of customer {customer_id}"),
                    e,
                )
            })?;
        if !remaining.is_empty() {
            return Ok(());
        }

        info!(%customer_id, "deleting customer without mailing entries");
        self.repository
            .delete_customer_by_id(customer_id)
            .await
            .map_err(|e| {
                MailingError::repository(format!("error deleting customer {customer_id}"), e)
            })
    }
}
