//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (proxy routes reference existing upstreams)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::{RouterConfig, TargetConfig, PLACEHOLDER_API_KEY};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("listener.max_connections must be greater than zero")]
    ZeroConnections,

    #[error("security.max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("duplicate upstream name '{0}'")]
    DuplicateUpstream(String),

    #[error("upstream '{name}' has zero {field}")]
    ZeroUpstreamTimeout { name: String, field: &'static str },

    #[error("upstream '{name}' health_check_path must start with '/'")]
    InvalidHealthPath { name: String },

    #[error("no routes defined")]
    NoRoutes,

    #[error("duplicate route name '{0}'")]
    DuplicateRoute(String),

    #[error("route '{name}' path_prefix '{prefix}' must start with '/'")]
    InvalidPrefix { name: String, prefix: String },

    #[error("route '{name}' conflicts with route '{other}' (same host and prefix)")]
    ConflictingRoutes { name: String, other: String },

    #[error("route '{route}' references unknown upstream '{upstream}'")]
    UnknownUpstream { route: String, upstream: String },

    #[error("route '{0}' has an empty static root")]
    EmptyStaticRoot(String),

    #[error("no catch-all route for '/' without a host condition")]
    MissingCatchAll,

    #[error("invalid domain '{0}'")]
    InvalidDomain(String),

    #[error("duplicate domain '{0}'")]
    DuplicateDomain(String),

    #[error("tls requires at least one domain in the binding")]
    TlsWithoutDomain,

    #[error("admin.api_key must be changed when the admin API is enabled")]
    PlaceholderApiKey,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_listener(config, &mut errors);
    validate_binding(config, &mut errors);
    validate_upstreams(config, &mut errors);
    validate_routes(config, &mut errors);

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }
    if config.admin.enabled {
        check_socket_addr("admin.bind_address", &config.admin.bind_address, &mut errors);
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::PlaceholderApiKey);
        }
    }
    if config.observability.metrics_enabled {
        check_socket_addr(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_listener(config: &RouterConfig, errors: &mut Vec<ValidationError>) {
    check_socket_addr("listener.bind_address", &config.listener.bind_address, errors);
    if config.binding.tls.is_some() {
        check_socket_addr(
            "listener.tls_bind_address",
            &config.listener.tls_bind_address,
            errors,
        );
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }
}

fn validate_binding(config: &RouterConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for domain in &config.binding.domains {
        let normalized = domain.to_ascii_lowercase();
        if !is_valid_domain(&normalized) {
            errors.push(ValidationError::InvalidDomain(domain.clone()));
        } else if !seen.insert(normalized) {
            errors.push(ValidationError::DuplicateDomain(domain.clone()));
        }
    }
    if config.binding.tls.is_some() && config.binding.domains.is_empty() {
        errors.push(ValidationError::TlsWithoutDomain);
    }
}

fn validate_upstreams(config: &RouterConfig, errors: &mut Vec<ValidationError>) {
    let mut names = HashSet::new();
    for upstream in &config.upstreams {
        if !names.insert(upstream.name.as_str()) {
            errors.push(ValidationError::DuplicateUpstream(upstream.name.clone()));
        }
        let has_port = upstream
            .address
            .parse::<Authority>()
            .map(|a| a.port_u16().is_some())
            .unwrap_or(false);
        if !has_port {
            errors.push(ValidationError::InvalidAddress {
                field: "upstream",
                value: upstream.address.clone(),
            });
        }
        if !upstream.health_check_path.starts_with('/') {
            errors.push(ValidationError::InvalidHealthPath {
                name: upstream.name.clone(),
            });
        }
        for (field, value) in [
            ("connect_timeout_secs", upstream.connect_timeout_secs),
            ("read_timeout_secs", upstream.read_timeout_secs),
            ("write_timeout_secs", upstream.write_timeout_secs),
        ] {
            if value == 0 {
                errors.push(ValidationError::ZeroUpstreamTimeout {
                    name: upstream.name.clone(),
                    field,
                });
            }
        }
    }
}

fn validate_routes(config: &RouterConfig, errors: &mut Vec<ValidationError>) {
    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
        return;
    }

    let upstreams: HashSet<&str> = config.upstreams.iter().map(|u| u.name.as_str()).collect();
    let mut names = HashSet::new();
    let mut keys: Vec<(Option<String>, String, &str)> = Vec::new();
    let mut has_catch_all = false;

    for route in &config.routes {
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix {
                name: route.name.clone(),
                prefix: route.path_prefix.clone(),
            });
            continue;
        }

        let host = route.host.as_ref().map(|h| h.to_ascii_lowercase());
        let prefix = normalize_prefix(&route.path_prefix);
        if let Some((_, _, other)) = keys.iter().find(|(h, p, _)| *h == host && *p == prefix) {
            errors.push(ValidationError::ConflictingRoutes {
                name: route.name.clone(),
                other: (*other).to_string(),
            });
        }
        if host.is_none() && prefix == "/" {
            has_catch_all = true;
        }
        keys.push((host, prefix, route.name.as_str()));

        match &route.target {
            TargetConfig::Proxy { upstream } => {
                if !upstreams.contains(upstream.as_str()) {
                    errors.push(ValidationError::UnknownUpstream {
                        route: route.name.clone(),
                        upstream: upstream.clone(),
                    });
                }
            }
            TargetConfig::Static(target) => {
                if target.root.as_os_str().is_empty() {
                    errors.push(ValidationError::EmptyStaticRoot(route.name.clone()));
                }
            }
        }
    }

    if !has_catch_all {
        errors.push(ValidationError::MissingCatchAll);
    }
}

/// Strip trailing slashes so `/videos/` and `/videos` compare equal; `/` stays `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn check_socket_addr(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty()
        && domain.len() <= 253
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RouteConfig, UpstreamConfig};

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&RouterConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_error() {
        let mut config = RouterConfig::default();
        config.routes.push(RouteConfig::proxy("api", "/api", "missing"));
        config.upstreams.push(UpstreamConfig::new("webapp", "no-port"));
        config.security.max_body_size = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::UnknownUpstream {
            route: "api".into(),
            upstream: "missing".into(),
        }));
        assert!(errors.contains(&ValidationError::DuplicateUpstream("webapp".into())));
        assert!(errors.contains(&ValidationError::ZeroBodyLimit));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidAddress { field: "upstream", .. })));
    }

    #[test]
    fn requires_catch_all() {
        let mut config = RouterConfig::default();
        config.routes.retain(|r| r.path_prefix != "/");
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MissingCatchAll]);
    }

    #[test]
    fn trailing_slash_prefixes_conflict() {
        let mut config = RouterConfig::default();
        config.routes.push(RouteConfig::static_files("videos2", "/videos", "other"));
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ConflictingRoutes {
                name: "videos2".into(),
                other: "videos".into(),
            }]
        );
    }

    #[test]
    fn rejects_bad_domains() {
        let mut config = RouterConfig::default();
        config.binding.domains = vec![
            "video.example.com".into(),
            "VIDEO.example.com".into(),
            "bad_domain".into(),
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateDomain("VIDEO.example.com".into())));
        assert!(errors.contains(&ValidationError::InvalidDomain("bad_domain".into())));
    }

    #[test]
    fn admin_requires_real_key() {
        let mut config = RouterConfig::default();
        config.admin.enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::PlaceholderApiKey]
        );
    }

    #[test]
    fn normalizes_prefixes() {
        assert_eq!(normalize_prefix("/"), "/");
        assert_eq!(normalize_prefix("/videos/"), "/videos");
        assert_eq!(normalize_prefix("/videos"), "/videos");
    }
}
