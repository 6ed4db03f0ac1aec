//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every upstream's health-check path
//! - Update upstream health state based on results
//!
//! Reads the live snapshot on every round, so reloaded upstreams, intervals
//! and thresholds apply without restarting the monitor.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{header, Request};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::HealthCheckConfig;
use crate::config::store::ConfigStore;
use crate::health::passive::record_outcome;
use crate::upstream::Upstream;

pub struct HealthMonitor {
    store: Arc<ConfigStore>,
}

impl HealthMonitor {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Health monitor starting");

        loop {
            let snapshot = self.store.load();
            let config = snapshot.config.health_check.clone();

            if config.enabled {
                for upstream in snapshot.upstreams.all() {
                    check_upstream(&upstream, &config).await;
                }
            }
            drop(snapshot);

            tokio::select! {
                _ = time::sleep(Duration::from_secs(config.interval_secs.max(1))) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// Probe one upstream and record the outcome.
pub async fn check_upstream(upstream: &Upstream, config: &HealthCheckConfig) -> bool {
    let path = PathAndQuery::try_from(upstream.health_check_path.as_str())
        .unwrap_or_else(|_| PathAndQuery::from_static("/"));
    let uri = match upstream.uri_for(Some(&path)) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(upstream = %upstream.name, error = %e, "Failed to build health check URI");
            return false;
        }
    };

    let request = match Request::get(uri)
        .header(header::USER_AGENT, "edge-router-health-check")
        .header(header::HOST, upstream.authority.as_str())
        .body(Body::empty())
    {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(upstream = %upstream.name, error = %e, "Failed to build health check request");
            return false;
        }
    };

    let timeout = Duration::from_secs(config.timeout_secs);
    let healthy = match time::timeout(timeout, upstream.client().request(request)).await {
        Ok(Ok(response)) => {
            let success = response.status().is_success();
            if !success {
                tracing::warn!(upstream = %upstream.name, status = %response.status(), "Health check failed: non-success status");
            }
            success
        }
        Ok(Err(e)) => {
            tracing::warn!(upstream = %upstream.name, error = %e, "Health check failed: connection error");
            false
        }
        Err(_) => {
            tracing::warn!(upstream = %upstream.name, "Health check failed: timeout");
            false
        }
    };

    record_outcome(upstream, healthy, config);
    healthy
}
