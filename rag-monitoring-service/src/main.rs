use anyhow::Result;
use rag_monitoring_api::observability::{
    LogConfig, ObservabilityConfig, ObservabilityContext, SETUP_TARGET,
};
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = config::Config::load()?;

    // Bring logging and tracing up before the listener exists
    let mut observability = ObservabilityContext::new(ObservabilityConfig {
        log: LogConfig {
            level: config.rag_log_level.clone(),
        },
        tracing: config.otel.clone(),
    });
    observability.initialize()?;

    let app = rag_monitoring_api::app();

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(target: SETUP_TARGET, "Listening on {addr}");
    observability.mark_serving();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Flush buffered spans before exit
    observability.shutdown()?;
    info!(target: SETUP_TARGET, "Shutdown complete.");

    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!(target: SETUP_TARGET, "Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!(target: SETUP_TARGET, "Received SIGTERM");
        }
    }
}
