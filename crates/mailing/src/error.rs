use thiserror::Error;

use mailman_core::DomainError;

use crate::email::EmailError;
use crate::repository::RepositoryError;

/// Failure of a mailing service call.
///
/// `Domain` errors are meant for the client; the rest are internal and carry
/// a short description of the step that failed.
#[derive(Debug, Error)]
pub enum MailingError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{context}: {source}")]
    Repository {
        context: String,
        source: RepositoryError,
    },

    #[error("{context}: {source}")]
    Email { context: String, source: EmailError },
}

impl MailingError {
    pub fn repository(context: impl Into<String>, source: RepositoryError) -> Self {
        Self::Repository {
            context: context.into(),
            source,
        }
    }

    pub fn email(context: impl Into<String>, source: EmailError) -> Self {
        Self::Email {
            context: context.into(),
            source,
        }
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(err) => Some(err),
            _ => None,
        }
    }
}
