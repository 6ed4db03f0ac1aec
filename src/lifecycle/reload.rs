//! Configuration reload.
//!
//! # Responsibilities
//! - Serialize reloads from every source (file watcher, SIGHUP, admin API)
//! - Prepare the successor snapshot off to the side
//! - Activate TLS material, then swap the snapshot in one step
//!
//! # Design Decisions
//! - All-or-nothing: any failure leaves the live snapshot untouched
//! - Listener addresses are bound at startup; a reload changing them is
//!   applied for everything else and logged
//! - A binding whose TLS listener cannot start is rejected like any other
//!   invalid configuration

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::loader::load_config;
use crate::config::schema::RouterConfig;
use crate::config::store::{ConfigStore, ReloadError, Snapshot};
use crate::net::tls::TlsSupervisor;
use crate::observability::metrics;

pub struct Reloader {
    store: Arc<ConfigStore>,
    tls: Arc<TlsSupervisor>,
    lock: Mutex<()>,
}

impl Reloader {
    pub fn new(store: Arc<ConfigStore>, tls: Arc<TlsSupervisor>) -> Self {
        Self {
            store,
            tls,
            lock: Mutex::new(()),
        }
    }

    /// Make `config` live, or leave the running configuration as it is.
    pub async fn apply(&self, config: RouterConfig) -> Result<Arc<Snapshot>, ReloadError> {
        let _guard = self.lock.lock().await;
        let current = self.store.load();

        let next = match self.stage(config, &current).await {
            Ok(next) => next,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    version = current.version,
                    "Configuration rejected, keeping current configuration"
                );
                metrics::record_reload("rejected", current.version);
                return Err(e);
            }
        };

        let live = self.store.install(next);

        tracing::info!(
            version = live.version,
            binding = %live.binding.state(),
            transition = %live.transition,
            routes = live.routes.len(),
            "Configuration applied"
        );
        metrics::record_reload("applied", live.version);
        Ok(live)
    }

    /// Prepare the successor snapshot and bring up the TLS side it needs.
    async fn stage(&self, config: RouterConfig, current: &Snapshot) -> Result<Snapshot, ReloadError> {
        let next = Snapshot::prepare(config, Some(current)).await?;
        warn_restart_only_changes(&current.config, &next.config);

        // The certificate must be in place before the binding that needs it.
        // On a TLS(A) -> TLS(B) migration, handshakes that land between this
        // swap and the snapshot install below get B's certificate while A is
        // still the accepted host.
        self.tls.activate(&next.binding).await?;
        Ok(next)
    }

    /// Load `path` and apply it.
    pub async fn reload_from(&self, path: &Path) -> Result<Arc<Snapshot>, ReloadError> {
        let config = load_config(path).map_err(|e| {
            tracing::error!(path = ?path, error = %e, "Failed to load configuration file");
            metrics::record_reload("rejected", self.store.version());
            ReloadError::from(e)
        })?;
        self.apply(config).await
    }
}

fn warn_restart_only_changes(current: &RouterConfig, next: &RouterConfig) {
    if current.listener != next.listener {
        tracing::warn!("Listener settings changed; restart to apply them");
    }
    if current.observability != next.observability || current.admin.bind_address != next.admin.bind_address {
        tracing::warn!("Observability or admin listener settings changed; restart to apply them");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Transition;
    use crate::config::schema::RouteConfig;

    async fn reloader() -> (Arc<ConfigStore>, Reloader) {
        let snapshot = Snapshot::prepare(RouterConfig::default(), None).await.unwrap();
        let store = Arc::new(ConfigStore::new(snapshot));
        let tls = Arc::new(TlsSupervisor::new(None, axum::Router::new()));
        (Arc::clone(&store), Reloader::new(store, tls))
    }

    #[tokio::test]
    async fn domain_switch_replaces_binding() {
        let (store, reloader) = reloader().await;

        let mut first = RouterConfig::default();
        first.binding.domains = vec!["a.test".into()];
        reloader.apply(first).await.unwrap();

        let mut second = RouterConfig::default();
        second.binding.domains = vec!["b.test".into()];
        let live = reloader.apply(second).await.unwrap();

        assert_eq!(live.version, 3);
        assert!(matches!(live.transition, Transition::DomainMigration { .. }));
        let binding = &store.load().binding;
        assert!(binding.accepts(Some("b.test")));
        assert!(!binding.accepts(Some("a.test")));
    }

    #[tokio::test]
    async fn rejected_reload_keeps_live_snapshot() {
        let (store, reloader) = reloader().await;

        let mut broken = RouterConfig::default();
        broken.routes = vec![RouteConfig::proxy("api", "/api", "webapp")];
        assert!(reloader.apply(broken).await.is_err());

        assert_eq!(store.version(), 1);
        assert_eq!(store.load().routes.len(), 3);
    }

    #[tokio::test]
    async fn unreadable_file_is_rejected() {
        let (store, reloader) = reloader().await;
        assert!(matches!(
            reloader.reload_from(Path::new("/nonexistent/edge-router.toml")).await,
            Err(ReloadError::Config(_))
        ));
        assert_eq!(store.version(), 1);
    }
}
