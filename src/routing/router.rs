//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Routes sorted once by specificity: longer prefix first, then
//!   host-qualified before host-agnostic
//! - First match in that order wins, so the longest prefix always wins

use std::path::PathBuf;

use axum::body::Body;
use axum::http::Request;

use crate::config::schema::{RouteConfig, StaticTargetConfig, TargetConfig};
use crate::config::validation::normalize_prefix;
use crate::http::cache::CachePolicy;
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};

/// A directory served under a route prefix.
#[derive(Debug, Clone)]
pub struct StaticTarget {
    pub root: PathBuf,
    pub cache: CachePolicy,
    pub allowed_extensions: Vec<String>,
    pub cors_allow_origin: Option<String>,
}

impl From<&StaticTargetConfig> for StaticTarget {
    fn from(config: &StaticTargetConfig) -> Self {
        Self {
            root: config.root.clone(),
            cache: CachePolicy {
                max_age_secs: config.max_age_secs,
                immutable: config.immutable,
            },
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            cors_allow_origin: config.cors_allow_origin.clone(),
        }
    }
}

/// What a matched route dispatches to.
#[derive(Debug, Clone)]
pub enum RouteTarget {
    Proxy { upstream: String },
    Static(StaticTarget),
}

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    /// Normalized prefix (no trailing slash except `/`).
    pub prefix: String,
    pub host: Option<String>,
    pub target: RouteTarget,
    pub access_log: bool,
    matcher: AndMatcher,
}

impl Route {
    fn compile(config: &RouteConfig) -> Self {
        let prefix = normalize_prefix(&config.path_prefix);
        let host = config.host.as_ref().map(|h| h.to_ascii_lowercase());

        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = &host {
            matchers.push(Box::new(HostMatcher::new(host.clone())));
        }
        matchers.push(Box::new(PathPrefixMatcher::new(prefix.clone())));

        let (target, access_log) = match &config.target {
            TargetConfig::Proxy { upstream } => (
                RouteTarget::Proxy {
                    upstream: upstream.clone(),
                },
                true,
            ),
            TargetConfig::Static(target) => {
                (RouteTarget::Static(StaticTarget::from(target)), target.access_log)
            }
        };

        Self {
            name: config.name.clone(),
            prefix,
            host,
            target,
            access_log,
            matcher: AndMatcher::new(matchers),
        }
    }

    /// The part of `path` below this route's prefix, without a leading slash.
    pub fn relative_path<'a>(&self, path: &'a str) -> &'a str {
        let rest = if self.prefix == "/" {
            path
        } else {
            path.strip_prefix(self.prefix.as_str()).unwrap_or(path)
        };
        rest.trim_start_matches('/')
    }

    fn specificity(&self) -> (usize, bool) {
        (self.prefix.len(), self.host.is_some())
    }
}

/// Immutable, specificity-ordered route table.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile routes from configuration.
    pub fn from_config(configs: &[RouteConfig]) -> Self {
        let mut routes: Vec<Route> = configs.iter().map(Route::compile).collect();
        // Stable sort keeps declaration order among equally specific routes.
        routes.sort_by(|a, b| b.specificity().cmp(&a.specificity()));
        Self { routes }
    }

    /// Find the single route that handles this request.
    pub fn match_request(&self, req: &Request<Body>) -> Option<&Route> {
        self.routes.iter().find(|route| route.matcher.matches(req))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
