//! HTTP server as a shutdown-supervised activity.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use mailman_lifecycle::ShutdownHandle;

/// Serve `app` until `handle` is cancelled, then drain and notify.
///
/// Once cancelled the listener stops accepting connections and in-flight
/// requests get at most `min(handle.timeout(), drain_timeout)` to finish;
/// connections still open after that are abandoned.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    handle: ShutdownHandle,
    drain_timeout: Duration,
) -> std::io::Result<()> {
    let drain_timeout = handle.timeout().min(drain_timeout);
    let stop_accepting = {
        let handle = handle.clone();
        async move { handle.done().await }
    };

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(stop_accepting)
    .into_future();
    let mut server = std::pin::pin!(server);

    let result = tokio::select! {
        result = &mut server => result,
        () = handle.done() => {
            info!(?drain_timeout, "shutting down http server");
            match tokio::time::timeout(drain_timeout, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("http server did not drain in time, abandoning open connections");
                    Ok(())
                }
            }
        }
    };

    info!("http server stopped");
    handle.notify();
    result
}
