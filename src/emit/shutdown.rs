//! Graceful shutdown signal (SIGINT/SIGTERM on Unix, Ctrl+C elsewhere).

use anyhow::{Context, Result};
use tokio::signal;

/// Wait for a shutdown signal.
///
/// # Errors
/// Returns an error if installing the signal handler fails.
pub async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .context("failed to install SIGINT handler")?;
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => tracing::info!("received SIGINT"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.context("failed to install Ctrl+C handler")?;
        tracing::info!("received Ctrl+C");
    }

    Ok(())
}

/// Wrapper returning `()` for axum's `with_graceful_shutdown` and the push loop.
pub async fn shutdown_signal_handler() {
    if let Err(err) = shutdown_signal().await {
        tracing::error!(error = %err, "error setting up shutdown handler");
    }
}
