//! Host binding subsystem.
//!
//! # Data Flow
//! ```text
//! HostBindingConfig (domains, tls, redirect_http)
//!     → state.rs plan_transition (pure, may refuse)
//!     → HostBinding::prepare (load certificate, validated in isolation)
//!     → stored in the next config snapshot
//!     → swapped in atomically with routes and upstreams
//! ```
//!
//! # Design Decisions
//! - Exactly one binding is active at a time; a migration never runs two
//! - The old binding stays active until the new one is fully prepared
//! - Unknown hosts get 421 Misdirected Request

pub mod state;

use std::path::PathBuf;

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

use crate::config::schema::HostBindingConfig;
use crate::http::request::strip_port;
use crate::net::tls::load_tls_config;

pub use state::{plan_transition, BindingState, Transition};

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("an encrypted binding cannot be replaced by a plaintext one")]
    TlsDowngrade,

    #[error("failed to load certificate {cert:?}: {source}")]
    Certificate {
        cert: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Certificate material attached to a binding.
#[derive(Clone)]
pub struct BindingTls {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub config: RustlsConfig,
}

impl std::fmt::Debug for BindingTls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingTls")
            .field("cert_path", &self.cert_path)
            .field("key_path", &self.key_path)
            .finish_non_exhaustive()
    }
}

/// The active association of domains, listener and certificate.
#[derive(Debug, Clone)]
pub struct HostBinding {
    domains: Vec<String>,
    tls: Option<BindingTls>,
    redirect_http: bool,
}

impl HostBinding {
    /// A binding that answers for any host.
    pub fn unbound() -> Self {
        Self {
            domains: Vec::new(),
            tls: None,
            redirect_http: false,
        }
    }

    /// A plaintext binding for the given domains.
    pub fn plaintext<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim_end_matches('.').to_ascii_lowercase())
                .collect(),
            tls: None,
            redirect_http: false,
        }
    }

    /// Build a binding from configuration, loading its certificate.
    ///
    /// Runs without touching the active binding, so a bad certificate
    /// leaves the running router as it was.
    pub async fn prepare(config: &HostBindingConfig) -> Result<Self, BindingError> {
        let mut binding = Self::plaintext(&config.domains);
        binding.redirect_http = config.redirect_http;

        if let Some(tls) = &config.tls {
            let rustls = load_tls_config(&tls.cert_path, &tls.key_path)
                .await
                .map_err(|source| BindingError::Certificate {
                    cert: tls.cert_path.clone(),
                    source,
                })?;
            binding.tls = Some(BindingTls {
                cert_path: tls.cert_path.clone(),
                key_path: tls.key_path.clone(),
                config: rustls,
            });
        }
        Ok(binding)
    }

    pub fn state(&self) -> BindingState {
        match (self.domains.is_empty(), self.tls.is_some()) {
            (true, _) => BindingState::Unbound,
            (false, false) => BindingState::BoundSingleDomain,
            (false, true) => BindingState::BoundWithTls,
        }
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn tls(&self) -> Option<&BindingTls> {
        self.tls.as_ref()
    }

    /// Whether a request addressed to `host` belongs to this binding.
    pub fn accepts(&self, host: Option<&str>) -> bool {
        if self.domains.is_empty() {
            return true;
        }
        let Some(host) = host else {
            return false;
        };
        let host = strip_port(host).trim_end_matches('.');
        self.domains.iter().any(|d| d.eq_ignore_ascii_case(host))
    }

    /// Plaintext requests are answered with a redirect to the TLS endpoint.
    pub fn redirects_plaintext(&self) -> bool {
        self.tls.is_some() && self.redirect_http
    }
}
