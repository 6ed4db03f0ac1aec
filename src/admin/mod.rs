//! Admin API, served on its own listener.
//!
//! - `GET /admin/status`: version, binding, config version, connections
//! - `GET /admin/upstreams`: upstream health
//! - `POST /admin/reload`: re-read the configuration file

pub mod auth;
pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::config::store::ConfigStore;
use crate::lifecycle::reload::Reloader;
use crate::net::connection::ConnectionTracker;

use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<ConfigStore>,
    pub reloader: Arc<Reloader>,
    pub connections: ConnectionTracker,
    pub config_path: Option<PathBuf>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/upstreams", get(get_upstreams))
        .route("/admin/reload", post(post_reload))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
