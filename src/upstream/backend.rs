//! A single upstream application server.
//!
//! # Responsibilities
//! - Hold the upstream's address and stage timeouts
//! - Own a pooled HTTP client whose connector enforces the connect timeout
//! - Carry the shared health record

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, InvalidUriParts, PathAndQuery, Scheme};
use axum::http::Uri;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::config::schema::UpstreamConfig;
use crate::health::state::HealthTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub connect: Duration,
    /// Waiting for the response head, and between response body chunks.
    pub read: Duration,
    /// Between request body chunks while uploading.
    pub write: Duration,
}

impl From<&UpstreamConfig> for StageTimeouts {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            connect: Duration::from_secs(config.connect_timeout_secs),
            read: Duration::from_secs(config.read_timeout_secs),
            write: Duration::from_secs(config.write_timeout_secs),
        }
    }
}

pub type UpstreamClient = Client<HttpConnector, Body>;

#[derive(Debug)]
pub struct Upstream {
    pub name: String,
    pub authority: Authority,
    pub health_check_path: String,
    pub timeouts: StageTimeouts,
    pub health: Arc<HealthTracker>,
    client: UpstreamClient,
}

impl Upstream {
    /// Build an upstream; `health` is carried over across reloads when the
    /// upstream keeps its address.
    pub fn new(config: &UpstreamConfig, health: Arc<HealthTracker>) -> Result<Self, axum::http::uri::InvalidUri> {
        let authority = Authority::from_str(&config.address)?;
        let timeouts = StageTimeouts::from(config);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            name: config.name.clone(),
            authority,
            health_check_path: config.health_check_path.clone(),
            timeouts,
            health,
            client,
        })
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    /// Absolute URI for `path_and_query` on this upstream.
    pub fn uri_for(&self, path_and_query: Option<&PathAndQuery>) -> Result<Uri, InvalidUriParts> {
        let mut parts = axum::http::uri::Parts::default();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        parts.path_and_query = Some(
            path_and_query
                .cloned()
                .unwrap_or_else(|| PathAndQuery::from_static("/")),
        );
        Uri::from_parts(parts)
    }

    /// Whether `config` describes the same server as this upstream.
    pub fn same_server(&self, config: &UpstreamConfig) -> bool {
        self.name == config.name && self.authority.as_str() == config.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_uri_to_upstream() {
        let upstream = Upstream::new(
            &UpstreamConfig::new("webapp", "127.0.0.1:8000"),
            Arc::new(HealthTracker::new()),
        )
        .unwrap();

        let pq = PathAndQuery::from_static("/files?page=2");
        assert_eq!(
            upstream.uri_for(Some(&pq)).unwrap().to_string(),
            "http://127.0.0.1:8000/files?page=2"
        );
        assert_eq!(upstream.uri_for(None).unwrap().to_string(), "http://127.0.0.1:8000/");
        assert_eq!(upstream.timeouts.read, Duration::from_secs(300));
    }
}
