//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, every error collected)
//!     → store.rs Snapshot::prepare (compile routes, binding, upstreams)
//!     → ConfigStore (atomic swap of Arc<Snapshot>)
//!
//! On reload (file change, SIGHUP, admin API):
//!     watcher.rs / signal / handler
//!     → lifecycle::reload (serialized)
//!     → store.rs prepare + install
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A reload that fails anywhere leaves the running snapshot in place

pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;
pub mod watcher;

pub use schema::{
    HostBindingConfig, ListenerConfig, RouteConfig, RouterConfig, StaticTargetConfig, TargetConfig,
    TlsConfig, UpstreamConfig,
};
pub use store::{ConfigStore, ReloadError, Snapshot};
