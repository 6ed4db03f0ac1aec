//! Versioned configuration snapshots.
//!
//! A [`Snapshot`] is everything a request needs: routes, binding and
//! upstreams, compiled from one configuration. The [`ConfigStore`] swaps
//! whole snapshots atomically; a handler loads one snapshot at the start of
//! a request and uses it throughout, so it never observes half a reload.

use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::binding::{plan_transition, BindingError, HostBinding, Transition};
use crate::config::loader::ConfigError;
use crate::config::schema::RouterConfig;
use crate::config::validation::validate_config;
use crate::net::tls::TlsListenerError;
use crate::routing::RouteTable;
use crate::upstream::UpstreamPool;

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("binding rejected: {0}")]
    Binding(#[from] BindingError),

    #[error("invalid upstream address: {0}")]
    Upstream(#[from] axum::http::uri::InvalidUri),

    #[error("TLS listener unavailable: {0}")]
    Tls(#[from] TlsListenerError),
}

/// An immutable, compiled configuration.
#[derive(Debug)]
pub struct Snapshot {
    pub version: u64,
    pub config: RouterConfig,
    pub routes: RouteTable,
    pub binding: HostBinding,
    pub upstreams: UpstreamPool,
    /// How the binding changed relative to the previous snapshot.
    pub transition: Transition,
}

impl Snapshot {
    /// Validate and compile `config` as the successor of `previous`.
    ///
    /// Nothing here touches the running router; on error the caller simply
    /// keeps the snapshot it has.
    pub async fn prepare(config: RouterConfig, previous: Option<&Snapshot>) -> Result<Self, ReloadError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let transition = plan_transition(previous.map(|p| &p.config.binding), &config.binding)?;
        let binding = HostBinding::prepare(&config.binding).await?;
        let routes = RouteTable::from_config(&config.routes);
        let upstreams = UpstreamPool::build(&config.upstreams, previous.map(|p| &p.upstreams))?;

        Ok(Self {
            version: previous.map_or(1, |p| p.version + 1),
            config,
            routes,
            binding,
            upstreams,
            transition,
        })
    }
}

/// Holder of the live snapshot.
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<Snapshot>,
}

impl ConfigStore {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// The snapshot serving new requests.
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Make `next` live; requests already running keep their snapshot.
    pub fn install(&self, next: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));
        next
    }

    pub fn version(&self) -> u64 {
        self.current.load().version
    }
}
