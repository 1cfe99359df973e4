use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use mailman_api::app::{AppState, build_app};
use mailman_api::cli::Cli;
use mailman_api::server;
use mailman_infra::jobs::{STALE_ENTRY_CLEANUP, run_stale_entry_cleanup};
use mailman_infra::{InMemoryStore, PostgresStore, Settings, Storage, Transactioner};
use mailman_lifecycle::{ShutdownCoordinator, wait_for_shutdown_signal};
use mailman_mailing::LoggingEmailer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    mailman_observability::init(&cli.log_level);

    let settings =
        mailman_infra::config::load(&cli.config_files).context("loading configuration")?;
    info!(?settings, "configuration loaded");

    let coordinator = ShutdownCoordinator::new(settings.shutdown_timeout());

    match settings.global.storage {
        Storage::InMemory => {
            info!("using in-memory storage");
            run(Arc::new(InMemoryStore::new()), &settings, &coordinator).await
        }
        Storage::Postgres => {
            let store = PostgresStore::connect(&settings.postgres, settings.postgres_timeout())
                .await
                .context("connecting to postgres")?;
            store.migrate().await.context("migrating the database")?;

            let pool_handle = coordinator.new_handle("postgres pool")?;
            tokio::spawn(store.clone().close_on_shutdown(pool_handle));
            run(Arc::new(store), &settings, &coordinator).await
        }
    }
}

/// Start the supervised activities and block until a shutdown signal.
async fn run<T>(
    transactioner: Arc<T>,
    settings: &Settings,
    coordinator: &ShutdownCoordinator,
) -> anyhow::Result<()>
where
    T: Transactioner + 'static,
{
    let listener = TcpListener::bind(("0.0.0.0", settings.http_server.port))
        .await
        .with_context(|| format!("binding port {}", settings.http_server.port))?;
    info!(address = %listener.local_addr()?, "http server listening");

    let app = build_app(AppState::new(
        Arc::clone(&transactioner),
        Arc::new(LoggingEmailer::new()),
        settings.staleness_threshold(),
    ));
    let http_handle = coordinator.new_handle("http server")?;
    let drain_timeout = settings.http_shutdown_timeout();
    tokio::spawn(async move {
        if let Err(err) = server::serve(listener, app, http_handle, drain_timeout).await {
            error!(error = %err, "http server failed");
        }
    });

    let cleanup_handle = coordinator.new_handle(STALE_ENTRY_CLEANUP)?;
    tokio::spawn(run_stale_entry_cleanup(
        transactioner,
        settings.staleness_threshold(),
        settings.cleanup_period(),
        cleanup_handle,
    ));

    let signal = wait_for_shutdown_signal()
        .await
        .context("listening for shutdown signals")?;
    info!(signal, "starting graceful shutdown");

    coordinator.cancel().await;
    info!("shutdown complete");
    Ok(())
}
