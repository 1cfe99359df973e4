use axum::http::StatusCode;
use tracing::debug;

/// Always 200: a server that answers is healthy.
pub async fn health() -> StatusCode {
    debug!("health probe");
    StatusCode::OK
}
