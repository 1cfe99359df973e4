//! Termination signal handling.

/// Wait until the process is asked to terminate.
///
/// SIGINT covers ctrl+c, SIGTERM covers container orchestrators stopping the
/// process. Returns the name of the signal that was caught.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let caught = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    tracing::info!(signal = caught, "caught signal, shutting down");
    Ok(caught)
}

// Best-effort implementation for non-unix systems
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "CTRL+C", "caught signal, shutting down");
    Ok("CTRL+C")
}
