use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use departure_monitor::config::AppConfig;
use departure_monitor::registry::ProviderRegistry;
use departure_monitor::web::{AppState, create_router};

const DEFAULT_LOG_FILTER: &str = "departure_monitor=info,tower_http=info";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "departure monitor failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let providers = Arc::new(ProviderRegistry::from_config(&config)?);
    let monitors = providers.build_monitors(&config)?;
    if monitors.is_empty() {
        tracing::warn!("no monitors configured; only stop search is available");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = monitors.spawn_all(&shutdown_rx);
    tracing::info!(monitors = monitors.len(), "monitors started");

    let state = AppState::new(monitors, Arc::clone(&providers));
    let app = create_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.server.bind).await?;
    tracing::info!(addr = %config.server.bind, "listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "monitor task ended abnormally");
        }
    }
    providers.shutdown().await;
    Ok(())
}
