use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mailman_core::{CustomerId, DomainError, DomainResult, MailingEntryId, MailingId};

/// Recipient of mailing entries, identified by a unique email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
}

/// Customer that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub email: String,
}

/// A stored outbound message waiting to be sent as part of a mailing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailingEntry {
    pub id: MailingEntryId,
    pub customer_id: CustomerId,
    pub mailing_id: MailingId,
    pub title: String,
    pub content: String,
    pub insert_time: DateTime<Utc>,
}

/// Mailing entry that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMailingEntry {
    pub customer_id: CustomerId,
    pub mailing_id: MailingId,
    pub title: String,
    pub content: String,
    pub insert_time: DateTime<Utc>,
}

/// A mailing entry as submitted by a client: the recipient is an email
/// address, resolved to a customer when the entry is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailingEntryDraft {
    pub mailing_id: MailingId,
    pub email: String,
    pub title: String,
    pub content: String,
    pub insert_time: DateTime<Utc>,
}

impl MailingEntryDraft {
    /// Check that every field is present and the email looks like an address.
    pub fn validate(&self) -> DomainResult<()> {
        let mut problems = Vec::new();
        if self.mailing_id.get() == 0 {
            problems.push("mailing_id: required");
        }
        if self.email.trim().is_empty() {
            problems.push("email: required");
        } else if !looks_like_email(&self.email) {
            problems.push("email: email");
        }
        if self.title.trim().is_empty() {
            problems.push("title: required");
        }
        if self.content.trim().is_empty() {
            problems.push("content: required");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(DomainError::bad_input(format!(
                "invalid request body: {}",
                problems.join(", ")
            )))
        }
    }
}

fn looks_like_email(candidate: &str) -> bool {
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !candidate.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> MailingEntryDraft {
        MailingEntryDraft {
            mailing_id: MailingId::new(1),
            email: "jan.kowalski@example.com".to_string(),
            title: "Interview".to_string(),
            content: "Interview at 10:00".to_string(),
            insert_time: Utc::now(),
        }
    }

    #[test]
    fn accepts_a_complete_draft() {
        assert_eq!(draft().validate(), Ok(()));
    }

    #[test]
    fn reports_every_missing_field() {
        let invalid = MailingEntryDraft {
            mailing_id: MailingId::new(0),
            title: String::new(),
            content: "  ".to_string(),
            ..draft()
        };
        let err = invalid.validate().unwrap_err();
        assert_eq!(
            err,
            DomainError::bad_input(
                "invalid request body: mailing_id: required, title: required, content: required"
            )
        );
    }

    #[test]
    fn rejects_malformed_emails() {
        for email in ["no-at-sign", "@example.com", "jan@", "jan@example", "jan@@example.com", "ja n@example.com", "jan@example..com"] {
            let invalid = MailingEntryDraft { email: email.to_string(), ..draft() };
            assert!(invalid.validate().is_err(), "{email} should be rejected");
        }
    }
}
