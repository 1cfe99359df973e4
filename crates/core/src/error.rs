//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// These are the failures a client is allowed to see verbatim: each variant
/// maps onto a response status at the API boundary. Infrastructure failures
/// belong elsewhere and surface to clients only as a generic internal error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The input was malformed or violates a business rule (e.g. duplicate entry).
    #[error("bad input: {0}")]
    BadInput(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Authorization failure at the domain boundary.
    ///
    /// No mailing operation raises it yet; the API still maps it to 401 so an
    /// authenticating layer in front of the services can report it.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn bad_input(msg: impl Into<String>) -> Self {
        Self::BadInput(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Message safe to return to a client.
    pub fn message(&self) -> &str {
        match self {
            Self::BadInput(msg) | Self::InvalidId(msg) | Self::NotFound(msg) => msg,
            Self::Unauthorized => "unauthorized",
        }
    }
}
