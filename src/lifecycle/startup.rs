//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and metrics
//! - Bind listeners and begin accepting traffic
//! - Start background tasks (watcher, SIGHUP, admin API)
//! - Drain on SIGINT/SIGTERM within the configured grace period
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::loader::load_config;
use crate::config::schema::RouterConfig;
use crate::config::store::{ReloadError, Snapshot};
use crate::config::watcher::ConfigWatcher;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::{spawn_reload_on_hangup, wait_for_shutdown};
use crate::net::listener::Listener;
use crate::observability::{logging, metrics};

fn load(config_path: Option<&Path>) -> Result<RouterConfig, ReloadError> {
    match config_path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(RouterConfig::default()),
    }
}

/// Validate a configuration the way startup would, certificates included.
pub async fn check(config_path: Option<&Path>) -> Result<Snapshot, ReloadError> {
    Snapshot::prepare(load(config_path)?, None).await
}

/// Run the router until SIGINT/SIGTERM.
pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load(config_path.as_deref())?;
    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        bind_address = %config.listener.bind_address,
        domains = ?config.binding.domains,
        tls = config.binding.tls.is_some(),
        "edge-router starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config.clone()).await?;
    let listener = Listener::bind(&config.listener, server.connections()).await?;

    let shutdown = Shutdown::new();
    let (update_tx, update_rx) = mpsc::unbounded_channel();

    // The watcher stops when dropped; keep it until the end of `run`.
    let _watcher = match &config_path {
        Some(path) => match ConfigWatcher::new(path, update_tx).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::error!(error = %e, "Config watcher unavailable; reload with SIGHUP or the admin API");
                None
            }
        },
        None => None,
    };

    if let Some(path) = &config_path {
        spawn_reload_on_hangup(server.reloader(), path.clone(), shutdown.subscribe())?;
    }

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        let app = setup_admin_router(AdminState {
            store: server.store(),
            reloader: server.reloader(),
            connections: server.connections(),
            config_path: config_path.clone(),
        });
        let mut admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let result = axum::serve(admin_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let store = server.store();
    let mut server_task = tokio::spawn(server.run(listener, update_rx, shutdown.subscribe()));

    tokio::select! {
        _ = wait_for_shutdown() => {}
        result = &mut server_task => {
            // The server only returns early on a fatal listener error.
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(e.into()),
            };
        }
    }

    shutdown.trigger();
    let grace = Duration::from_secs(store.load().config.timeouts.shutdown_grace_secs);
    match tokio::time::timeout(grace, server_task).await {
        Ok(_) => tracing::info!("Shutdown complete"),
        Err(_) => tracing::warn!(grace_secs = grace.as_secs(), "Grace period expired, abandoning open connections"),
    }
    Ok(())
}
