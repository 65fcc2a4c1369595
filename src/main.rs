//! Postern - Entry Point
//!
//! Loads configuration, starts the proxy server, and handles graceful
//! shutdown on Ctrl+C or SIGTERM.

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use postern::config::{Config, LogConfig};
use postern::server::ProxyServer;

#[tokio::main]
async fn main() -> postern::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log);

    info!("Starting Postern");

    let server = ProxyServer::new(config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(shutdown_rx).await {
            error!("Proxy server error: {}", e);
        }
    });

    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = server_task.await;

    info!("Postern stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("postern={},tower_http=info", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if log.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
