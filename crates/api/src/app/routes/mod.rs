use axum::{
    Router,
    routing::{delete, post},
};

use mailman_infra::Transactioner;

use crate::app::AppState;

pub mod messages;
pub mod system;

/// Router for the mailing entry endpoints.
pub fn router<T: Transactioner + 'static>() -> Router<AppState<T>> {
    Router::new()
        .route("/api/messages", post(messages::create::<T>))
        .route("/api/messages/send", post(messages::send::<T>))
        .route("/api/messages/:id", delete(messages::delete::<T>))
}
