//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Maximum request body accepted by default (2 GiB).
pub const DEFAULT_MAX_BODY_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Upstream stage timeout sized for large video transfers.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 300;

/// One year, the cache lifetime given to published assets.
pub const DEFAULT_ASSET_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// Root configuration for the edge router.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind addresses, connection limits).
    pub listener: ListenerConfig,

    /// Host binding: recognized domains and optional certificate.
    pub binding: HostBindingConfig,

    /// Backend applications matched requests may be proxied to.
    pub upstreams: Vec<UpstreamConfig>,

    /// Route definitions, evaluated by specificity.
    pub routes: Vec<RouteConfig>,

    /// Active upstream health check settings.
    pub health_check: HealthCheckConfig,

    /// Whole-request timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Body limits and forwarded-header trust.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            binding: HostBindingConfig::default(),
            upstreams: vec![UpstreamConfig::new("webapp", "127.0.0.1:8000")],
            routes: vec![
                RouteConfig::static_files("videos", "/videos/", "videos"),
                RouteConfig::static_files("converted", "/converted/", "converted"),
                RouteConfig::proxy("app", "/", "webapp"),
            ],
            health_check: HealthCheckConfig::default(),
            timeouts: TimeoutConfig::default(),
            security: SecurityConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Listener configuration.
///
/// These settings are bound at startup; a reload that changes them is
/// accepted but only takes effect after a restart.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Plaintext bind address (e.g., "0.0.0.0:80").
    pub bind_address: String,

    /// Encrypted bind address, used once the binding carries a certificate.
    pub tls_bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls_bind_address: "0.0.0.0:8443".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Host binding configuration.
///
/// An empty domain list leaves the router unbound: every Host is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostBindingConfig {
    /// Domain names this router answers for.
    pub domains: Vec<String>,

    /// Certificate attached to the binding.
    pub tls: Option<TlsConfig>,

    /// Redirect plaintext requests to the encrypted endpoint when TLS is attached.
    pub redirect_http: bool,
}

impl Default for HostBindingConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            tls: None,
            redirect_http: true,
        }
    }
}

/// TLS configuration for the binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

/// Backend application definition.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Unique upstream identifier referenced by proxy routes.
    pub name: String,

    /// Backend address (e.g., "127.0.0.1:8000").
    pub address: String,

    /// Path probed by the active health monitor.
    #[serde(default = "default_health_path")]
    pub health_check_path: String,

    /// Connection establishment timeout in seconds.
    #[serde(default = "default_upstream_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum wait for the response head and between response chunks.
    #[serde(default = "default_upstream_timeout")]
    pub read_timeout_secs: u64,

    /// Maximum wait between request body chunks sent upstream.
    #[serde(default = "default_upstream_timeout")]
    pub write_timeout_secs: u64,
}

impl UpstreamConfig {
    /// An upstream with default health path and timeouts.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            health_check_path: default_health_path(),
            connect_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            write_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
        }
    }
}

/// Route configuration mapping requests to a target.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host header to match (exact match, case-insensitive).
    #[serde(default)]
    pub host: Option<String>,

    /// Path prefix to match.
    pub path_prefix: String,

    /// What the route dispatches to.
    pub target: TargetConfig,
}

impl RouteConfig {
    pub fn proxy(name: &str, path_prefix: &str, upstream: &str) -> Self {
        Self {
            name: name.to_string(),
            host: None,
            path_prefix: path_prefix.to_string(),
            target: TargetConfig::Proxy {
                upstream: upstream.to_string(),
            },
        }
    }

    pub fn static_files(name: &str, path_prefix: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            host: None,
            path_prefix: path_prefix.to_string(),
            target: TargetConfig::Static(StaticTargetConfig::new(root)),
        }
    }
}

/// Route target, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetConfig {
    /// Forward to the named upstream.
    Proxy { upstream: String },
    /// Serve files from a directory.
    Static(StaticTargetConfig),
}

/// Static asset root settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StaticTargetConfig {
    /// Directory exposed under the route prefix.
    pub root: PathBuf,

    /// Cache lifetime in seconds.
    #[serde(default = "default_asset_max_age")]
    pub max_age_secs: u64,

    /// Mark assets immutable once published.
    #[serde(default = "default_true")]
    pub immutable: bool,

    /// Emit access log lines for this route.
    #[serde(default = "default_true")]
    pub access_log: bool,

    /// Lowercase extensions allowed to be served; empty allows all.
    #[serde(default)]
    pub allowed_extensions: Vec<String>,

    /// Value of `Access-Control-Allow-Origin`, if any.
    #[serde(default = "default_cors_origin")]
    pub cors_allow_origin: Option<String>,
}

impl StaticTargetConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_age_secs: DEFAULT_ASSET_MAX_AGE_SECS,
            immutable: true,
            access_log: true,
            allowed_extensions: Vec::new(),
            cors_allow_origin: default_cors_origin(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 5,
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Timeout configuration applied to every inbound request.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Ceiling on producing a static file response head, in seconds.
    /// Proxied requests are bounded by their upstream's stage timeouts.
    pub request_secs: u64,

    /// Grace period for draining connections on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 60,
            shutdown_grace_secs: 30,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes; bodies at or over it are rejected.
    pub max_body_size: u64,

    /// Append to client-supplied `X-Forwarded-For` instead of replacing it.
    pub trust_forwarded_headers: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            trust_forwarded_headers: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

/// Placeholder key rejected by validation when the admin API is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_upstream_timeout() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

fn default_asset_max_age() -> u64 {
    DEFAULT_ASSET_MAX_AGE_SECS
}

fn default_cors_origin() -> Option<String> {
    Some("*".to_string())
}
