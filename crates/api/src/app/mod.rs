//! HTTP API application wiring (Axum router + shared state).
//!
//! - `routes/`: HTTP handlers (one file per area)
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: mapping of failures onto error responses

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use tower_http::catch_panic::CatchPanicLayer;

use mailman_infra::Transactioner;
use mailman_mailing::Emailer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// State shared by every handler.
pub struct AppState<T> {
    pub transactioner: Arc<T>,
    pub emailer: Arc<dyn Emailer>,
    pub staleness_threshold: Duration,
}

impl<T> AppState<T> {
    pub fn new(
        transactioner: Arc<T>,
        emailer: Arc<dyn Emailer>,
        staleness_threshold: Duration,
    ) -> Self {
        Self {
            transactioner,
            emailer,
            staleness_threshold,
        }
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            transactioner: Arc::clone(&self.transactioner),
            emailer: Arc::clone(&self.emailer),
            staleness_threshold: self.staleness_threshold,
        }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app<T: Transactioner + 'static>(state: AppState<T>) -> Router {
    let router = Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router::<T>())
        .with_state(state);

    with_request_middleware(router)
}

/// Wrap a router in the request-context and panic-recovery layers.
pub fn with_request_middleware(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(middleware::panic_response))
        .layer(axum::middleware::from_fn(middleware::request_context))
}
