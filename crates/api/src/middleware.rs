use std::any::Any;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{Instrument, info};

use mailman_lifecycle::panic_message;
use mailman_observability::OperationContext;

use crate::app::errors::{ApiError, PendingError};

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const OPERATION_ID_HEADER: &str = "x-operation-id";

/// Run every request inside its own operation context.
///
/// The context (fresh operation id, client correlation id, method, uri and
/// client address) is stored in the request extensions and its span wraps
/// the rest of the stack. Error responses get their body rendered here, with
/// the operation id in it.
pub async fn request_context(mut req: Request, next: Next) -> Response {
    let context = operation_context(&req);
    let span = context.span();
    let operation_id = context.operation_id().to_string();
    req.extensions_mut().insert(context);

    async move {
        info!("begin processing request");
        let mut response = next.run(req).await;
        if let Some(pending) = response.extensions_mut().remove::<PendingError>() {
            response = pending.render(&operation_id);
        }
        if let Ok(value) = HeaderValue::from_str(&operation_id) {
            response.headers_mut().insert(OPERATION_ID_HEADER, value);
        }
        info!(status = response.status().as_u16(), "end processing request");
        response
    }
    .instrument(span)
    .await
}

fn operation_context(req: &Request) -> OperationContext {
    let mut context = OperationContext::new()
        .with_request_method(req.method().as_str())
        .with_request_uri(req.uri().to_string());

    if let Some(correlation_id) = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
    {
        context = context.with_correlation_id(correlation_id);
    }
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        context = context.with_client_ip(addr.ip().to_string());
    }
    context
}

/// Response for a handler that panicked.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    ApiError::Panic(panic_message(&*payload).to_string()).into_response()
}
