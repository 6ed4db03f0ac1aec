//! OS signal handling.
//!
//! # Responsibilities
//! - SIGTERM/SIGINT → graceful shutdown
//! - SIGHUP → configuration reload from the config file
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown

use std::sync::Arc;

#[cfg(unix)]
use std::path::PathBuf;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
#[cfg(unix)]
use tokio::sync::broadcast;

use crate::lifecycle::reload::Reloader;

/// Resolve on the first SIGINT or SIGTERM.
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
}

/// Reload `config_path` on every SIGHUP until shutdown.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(
    reloader: Arc<Reloader>,
    config_path: PathBuf,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tracing::info!(path = ?config_path, "SIGHUP received, reloading configuration");
                    // Errors are logged by the reloader.
                    let _ = reloader.reload_from(&config_path).await;
                }
                _ = shutdown.recv() => break,
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn spawn_reload_on_hangup(
    _reloader: Arc<Reloader>,
    _config_path: std::path::PathBuf,
    _shutdown: tokio::sync::broadcast::Receiver<()>,
) -> std::io::Result<()> {
    Ok(())
}
