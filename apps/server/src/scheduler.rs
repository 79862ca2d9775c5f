//! Lifecycle of the background price sync for the web server.
//!
//! The loop itself lives in `pricekeeper_core::sync`; this module starts it
//! after the state is built and stops it once the listener has drained.

use tracing::info;

use crate::config::Config;
use crate::main_lib::AppState;

/// Starts the background price sync unless disabled by `PK_SCHEDULER_ENABLED`.
pub async fn start_price_sync(state: &AppState, config: &Config) -> anyhow::Result<()> {
    if !config.scheduler_enabled {
        info!("Price sync scheduler disabled by configuration");
        return Ok(());
    }
    state.sync_scheduler.start().await?;
    Ok(())
}

/// Cancels the scheduler and waits for an in-flight run to record its outcome.
pub async fn stop_price_sync(state: &AppState) {
    state.sync_scheduler.stop().await;
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
