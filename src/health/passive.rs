//! Passive health checking (failure detection).
//!
//! # Responsibilities
//! - Observe proxied request outcomes
//! - Feed them into the same state machine as active probes
//!
//! # Design Decisions
//! - Only connection errors, timeouts and 502/503/504 count as failures
//! - 4xx are NOT failures (client error, not backend)
//! - Body-limit rejections and client aborts say nothing about the
//!   upstream and are ignored

use axum::http::StatusCode;

use crate::config::schema::HealthCheckConfig;
use crate::http::proxy::ProxyError;
use crate::observability::metrics;
use crate::upstream::Upstream;

/// Whether a proxied outcome says the upstream is failing.
pub fn indicates_failure(outcome: &Result<StatusCode, &ProxyError>) -> Option<bool> {
    match outcome {
        Ok(status) => Some(matches!(
            *status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        )),
        Err(ProxyError::PayloadTooLarge | ProxyError::ClientAborted) => None,
        Err(_) => Some(true),
    }
}

/// Apply one probe or request outcome to `upstream`'s health record.
pub fn record_outcome(upstream: &Upstream, healthy: bool, config: &HealthCheckConfig) {
    let flipped = if healthy {
        upstream.health.mark_success(config.healthy_threshold as usize)
    } else {
        upstream.health.mark_failure(config.unhealthy_threshold as usize)
    };

    if flipped {
        if healthy {
            tracing::info!(upstream = %upstream.name, "Upstream became healthy");
        } else {
            tracing::warn!(upstream = %upstream.name, "Upstream became unhealthy");
        }
    }
    metrics::record_upstream_health(&upstream.name, upstream.health.is_healthy());
}

/// Feed a proxied request's outcome into health tracking.
pub fn observe(upstream: &Upstream, outcome: Result<StatusCode, &ProxyError>, config: &HealthCheckConfig) {
    if let Some(failed) = indicates_failure(&outcome) {
        record_outcome(upstream, !failed, config);
    }
}
