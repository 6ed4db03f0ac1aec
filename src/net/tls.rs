//! TLS configuration, certificate loading and the encrypted listener.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::binding::HostBinding;
use crate::net::listener::ClientAddr;

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    if !cert_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

#[derive(Debug, Error)]
pub enum TlsListenerError {
    #[error("binding carries a certificate but listener.tls_bind_address is not a socket address")]
    NoBindAddress,

    #[error("failed to bind TLS listener on {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Owns the encrypted listener.
///
/// The listener starts the first time a binding with a certificate becomes
/// active; later bindings swap the certificate in place without rebinding.
pub struct TlsSupervisor {
    bind_address: Option<SocketAddr>,
    app: Router,
    live: Mutex<Option<RustlsConfig>>,
    handle: Handle,
}

impl TlsSupervisor {
    pub fn new(bind_address: Option<SocketAddr>, app: Router) -> Self {
        Self {
            bind_address,
            app,
            live: Mutex::new(None),
            handle: Handle::new(),
        }
    }

    /// Serve `binding`'s certificate, starting the listener if needed.
    ///
    /// The socket is bound before this returns, so a binding whose listener
    /// cannot start is refused instead of redirecting clients to a dead port.
    pub async fn activate(&self, binding: &HostBinding) -> Result<(), TlsListenerError> {
        let Some(tls) = binding.tls() else {
            return Ok(());
        };
        let mut live = self.live.lock().await;

        if let Some(current) = live.as_ref() {
            current.reload_from_config(tls.config.get_inner());
            tracing::info!(cert = ?tls.cert_path, "TLS certificate swapped");
            return Ok(());
        }

        let address = self.bind_address.ok_or(TlsListenerError::NoBindAddress)?;
        let socket = std::net::TcpListener::bind(address)
            .map_err(|source| TlsListenerError::Bind { address, source })?;
        let local = socket.local_addr().unwrap_or(address);

        let server = axum_server::tls_rustls::from_tcp_rustls(socket, tls.config.clone()).handle(self.handle.clone());
        let app = self.app.clone();
        tokio::spawn(async move {
            tracing::info!(address = %local, "TLS listener started");
            let result = server
                .serve(app.into_make_service_with_connect_info::<ClientAddr>())
                .await;
            match result {
                Ok(()) => tracing::info!("TLS listener stopped"),
                Err(e) => tracing::error!(address = %local, error = %e, "TLS listener failed"),
            }
        });
        *live = Some(tls.config.clone());
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.live.lock().await.is_some()
    }

    /// Stop accepting and give in-flight requests `grace` to finish.
    pub fn shutdown(&self, grace: Duration) {
        self.handle.graceful_shutdown(Some(grace));
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::schema::{HostBindingConfig, TlsConfig};

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tls").join(name)
    }

    async fn certified_binding() -> HostBinding {
        HostBinding::prepare(&HostBindingConfig {
            domains: vec!["a.example.com".to_string()],
            tls: Some(TlsConfig {
                cert_path: fixture("a.example.com.pem"),
                key_path: fixture("a.example.com.key"),
            }),
            redirect_http: true,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn missing_material_is_reported() {
        let err = load_tls_config(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        assert!(err.to_string().contains("Certificate file not found"));
    }

    #[tokio::test]
    async fn plaintext_binding_starts_no_listener() {
        let supervisor = TlsSupervisor::new("127.0.0.1:0".parse().ok(), Router::new());
        supervisor
            .activate(&HostBinding::plaintext(["video.example.com"]))
            .await
            .unwrap();
        assert!(!supervisor.is_running().await);
    }

    #[tokio::test]
    async fn occupied_port_refuses_binding() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let supervisor = TlsSupervisor::new(taken.local_addr().ok(), Router::new());

        let err = supervisor.activate(&certified_binding().await).await.unwrap_err();
        assert!(matches!(err, TlsListenerError::Bind { .. }));
        assert!(!supervisor.is_running().await);
    }

    #[tokio::test]
    async fn certificate_without_address_is_refused() {
        let supervisor = TlsSupervisor::new(None, Router::new());

        let err = supervisor.activate(&certified_binding().await).await.unwrap_err();
        assert!(matches!(err, TlsListenerError::NoBindAddress));
        assert!(!supervisor.is_running().await);
    }

    #[tokio::test]
    async fn listener_accepts_once_activated() {
        let free = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = free.local_addr().unwrap();
        drop(free);
        let supervisor = TlsSupervisor::new(Some(address), Router::new());

        supervisor.activate(&certified_binding().await).await.unwrap();
        assert!(supervisor.is_running().await);
        tokio::net::TcpStream::connect(address).await.unwrap();
        supervisor.shutdown(Duration::ZERO);
    }
}
