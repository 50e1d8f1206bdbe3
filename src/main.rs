//! Atelier - engine entry point
//!
//! Boots the service, restores persisted VFS snapshots, and runs until a
//! shutdown signal. Collaborator layers (HTTP API, UI) embed [`AppService`]
//! from the library instead of running this binary.

use tokio::signal;

use atelier::{AppService, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    if config.debug && config.logging.level == "info" {
        config.logging.level = "debug".to_string();
    }

    atelier_core::init_tracing(&config.logging)?;

    tracing::info!("Starting Atelier engine...");

    let service = AppService::new(config).await;

    if service.preview_available() {
        tracing::info!("Preview sandbox ready");
    } else {
        tracing::warn!("Docker unavailable; previews disabled");
    }
    tracing::info!("Engine ready");

    shutdown_signal().await;

    tracing::info!("Shutting down...");
    service.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
