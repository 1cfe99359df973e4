//! Request and response bodies of the messages API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mailman_core::{DomainError, MailingEntryId, MailingId};
use mailman_mailing::MailingEntryDraft;

/// Body of `POST /api/messages`.
///
/// Missing text fields deserialize as empty and are reported by validation
/// together with any other problem.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateMessageRequest {
    #[serde(default)]
    pub mailing_id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub insert_time: DateTime<Utc>,
}

impl CreateMessageRequest {
    pub fn into_draft(self) -> MailingEntryDraft {
        MailingEntryDraft {
            mailing_id: MailingId::new(self.mailing_id),
            email: self.email,
            title: self.title,
            content: self.content,
            insert_time: self.insert_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CreatedMessage {
    pub id: MailingEntryId,
}

/// Body of `POST /api/messages/send`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SendMailingRequest {
    #[serde(default)]
    pub mailing_id: i64,
}

impl SendMailingRequest {
    pub fn mailing_id(&self) -> Result<MailingId, DomainError> {
        if self.mailing_id == 0 {
            return Err(DomainError::bad_input(
                "invalid request body: mailing_id: required",
            ));
        }
        Ok(MailingId::new(self.mailing_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SentMailing {
    pub sent: usize,
}
