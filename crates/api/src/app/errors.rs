use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use mailman_core::DomainError;
use mailman_infra::TransactionError;
use mailman_mailing::MailingError;

const INTERNAL_ERROR_MESSAGE: &str = "request processing failed";

/// Any failure a handler can end with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Mailing(MailingError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("request processing panicked: {0}")]
    Panic(String),
}

impl From<MailingError> for ApiError {
    fn from(err: MailingError) -> Self {
        match err {
            MailingError::Domain(err) => Self::Domain(err),
            other => Self::Mailing(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Domain(DomainError::BadInput(_) | DomainError::InvalidId(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Domain(DomainError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Domain(DomainError::Unauthorized) => StatusCode::UNAUTHORIZED,
            Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::Mailing(_) | Self::Transaction(_) | Self::Panic(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the client. Internal failures stay generic.
    pub fn client_message(&self) -> String {
        match self {
            Self::Domain(err) => err.message().to_string(),
            Self::MalformedBody(_) => "malformed request body".to_string(),
            Self::Mailing(_) | Self::Transaction(_) | Self::Panic(_) => {
                INTERNAL_ERROR_MESSAGE.to_string()
            }
        }
    }
}

/// Standard error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
    pub operation_id: String,
}

/// Error response waiting for the request-context middleware to fill in the
/// operation id and render the body.
#[derive(Debug, Clone)]
pub struct PendingError {
    status: StatusCode,
    message: String,
}

impl PendingError {
    pub fn render(self, operation_id: &str) -> Response {
        let body = ErrorBody {
            status: self.status.as_u16(),
            message: self.message,
            operation_id: operation_id.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "error processing request");
        } else {
            warn!(error = %self, "request rejected");
        }

        let mut response = status.into_response();
        response.extensions_mut().insert(PendingError {
            status,
            message: self.client_message(),
        });
        response
    }
}
