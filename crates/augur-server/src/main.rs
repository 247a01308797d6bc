//! # Augur Server
//!
//! Loads configuration, installs tracing, builds the shared cache and runs
//! until a shutdown signal arrives. The cache is closed before exit so the
//! janitor task or Redis pool is released cleanly.

use augur_cache::{build_cache, Cache};
use augur_config::ConfigLoader;
use augur_core::{init_tracing, AugurResult};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Values cached by this service: permission and role name lists.
type PermissionCache = Arc<dyn Cache<Vec<String>>>;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Tracing may not be installed if startup failed early.
        eprintln!("Application error: {}", e);
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> AugurResult<()> {
    let config_loader = ConfigLoader::from_default_location()?;
    let config = config_loader.get().await;

    init_tracing(&config.observability.telemetry("augur-server"))?;

    info!("Starting Augur server...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.environment);
    info!("Cache backend: {}", config.cache.backend);

    let cache: PermissionCache = build_cache(&config.cache).await?;

    shutdown_signal().await;

    if let Err(e) = cache.close().await {
        warn!(error = %e, backend = cache.backend_name(), "Failed to close cache");
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }
}
