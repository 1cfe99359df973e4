use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use tracing::{Span, debug, info};

use mailman_core::MailingEntryId;
use mailman_infra::{Transactioner, within_transaction, within_transaction_returning};
use mailman_mailing::{
    MailingEntryCreator, MailingEntryRemover, MailingEntrySender, StaleEntryRemover,
};

use crate::app::AppState;
use crate::app::dto::{CreateMessageRequest, CreatedMessage, SendMailingRequest, SentMailing};
use crate::app::errors::ApiError;

fn name_operation(name: &str) {
    Span::current().record("operation", name);
}

/// `POST /api/messages`: store a mailing entry, creating its customer if needed.
pub async fn create<T: Transactioner + 'static>(
    State(state): State<AppState<T>>,
    body: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<Json<CreatedMessage>, ApiError> {
    name_operation("create mailing entry");
    let Json(request) = body?;
    let draft = request.into_draft();

    let entry = within_transaction_returning(&*state.transactioner, |repository| async move {
        MailingEntryCreator::new(&repository)
            .create(draft)
            .await
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(CreatedMessage { id: entry.id }))
}

/// `DELETE /api/messages/{id}`.
pub async fn delete<T: Transactioner + 'static>(
    State(state): State<AppState<T>>,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    name_operation("delete mailing entry with ID");
    let id: MailingEntryId = id.parse()?;

    within_transaction(&*state.transactioner, |repository| async move {
        MailingEntryRemover::new(&repository)
            .remove(id)
            .await
            .map_err(ApiError::from)
    })
    .await
}

/// `POST /api/messages/send`: send every entry of a mailing.
///
/// Stale entries of the mailing are purged first, in their own transaction,
/// so the purge sticks even when sending fails.
pub async fn send<T: Transactioner + 'static>(
    State(state): State<AppState<T>>,
    body: Result<Json<SendMailingRequest>, JsonRejection>,
) -> Result<Json<SentMailing>, ApiError> {
    name_operation("send mailing entries with mailing ID");
    let Json(request) = body?;
    let mailing_id = request.mailing_id()?;
    debug!(%mailing_id, "sending mailing entries");

    let threshold = state.staleness_threshold;
    let purged = within_transaction_returning(&*state.transactioner, |repository| async move {
        StaleEntryRemover::new(&repository, threshold)
            .remove_by_mailing_id(mailing_id)
            .await
            .map_err(ApiError::from)
    })
    .await?;
    if purged > 0 {
        info!(purged, %mailing_id, "purged stale entries before sending");
    }

    let emailer = state.emailer.clone();
    let sent = within_transaction_returning(&*state.transactioner, |repository| async move {
        MailingEntrySender::new(&repository, &*emailer)
            .send_mailing(mailing_id)
            .await
            .map_err(ApiError::from)
    })
    .await?;

    info!(sent, %mailing_id, "mailing sent");
    Ok(Json(SentMailing { sent }))
}
