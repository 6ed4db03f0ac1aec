//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Bytes, extract::Request, routing::any, Json, Router};
use edge_router::config::schema::{RouteConfig, RouterConfig, TlsConfig, UpstreamConfig};
use edge_router::config::store::ConfigStore;
use edge_router::lifecycle::{Reloader, Shutdown};
use edge_router::net::Listener;
use edge_router::HttpServer;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response_str = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(response_str.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// What the echo backend saw.
#[derive(Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub uri: String,
    pub headers: BTreeMap<String, String>,
    pub body_len: usize,
    pub body: Vec<u8>,
}

/// Start a backend that answers every request with an [`Echo`].
pub async fn start_echo_backend() -> SocketAddr {
    async fn echo(request: Request) -> Json<Echo> {
        let (parts, body) = request.into_parts();
        let body: Bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
        Json(Echo {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            headers: parts
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
                .collect(),
            body_len: body.len(),
            body: body.to_vec(),
        })
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/", any(echo)).route("/{*path}", any(echo));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Temporary asset roots laid out like the service's storage.
pub struct Assets {
    pub base: PathBuf,
}

impl Assets {
    pub fn new() -> Self {
        let base = std::env::temp_dir().join(format!("edge-router-it-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(base.join("videos")).unwrap();
        std::fs::create_dir_all(base.join("converted")).unwrap();
        std::fs::write(base.join("secret.txt"), b"outside the roots").unwrap();
        Self { base }
    }

    pub fn videos(&self) -> PathBuf {
        self.base.join("videos")
    }

    pub fn converted(&self) -> PathBuf {
        self.base.join("converted")
    }

    pub fn write(&self, relative: &str, contents: &[u8]) {
        let path = self.base.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}

impl Drop for Assets {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.base);
    }
}

/// The service layout: two asset roots and the application as catch-all.
pub fn router_config(upstream: SocketAddr, videos: &Path, converted: &Path) -> RouterConfig {
    let mut config = RouterConfig::default();
    config.upstreams = vec![UpstreamConfig::new("webapp", upstream.to_string())];
    config.routes = vec![
        RouteConfig::static_files("videos", "/videos/", videos),
        RouteConfig::static_files("converted", "/converted/", converted),
        RouteConfig::proxy("app", "/", "webapp"),
    ];
    config.health_check.enabled = false;
    config
}

pub struct TestRouter {
    pub addr: SocketAddr,
    pub store: Arc<ConfigStore>,
    pub reloader: Arc<Reloader>,
    pub shutdown: Shutdown,
}

impl TestRouter {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestRouter {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Run a router on an ephemeral port.
pub async fn spawn_router(config: RouterConfig) -> TestRouter {
    let server = HttpServer::new(config.clone()).await.unwrap();
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections, server.connections());

    let shutdown = Shutdown::new();
    let (_updates, config_updates) = mpsc::unbounded_channel();
    let store = server.store();
    let reloader = server.reloader();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestRouter {
        addr,
        store,
        reloader,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Checked-in self-signed certificate for `domain`.
pub fn tls_fixture(domain: &str) -> TlsConfig {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tls");
    TlsConfig {
        cert_path: dir.join(format!("{domain}.pem")),
        key_path: dir.join(format!("{domain}.key")),
    }
}

/// A client that resolves the test domains to loopback, trusts any
/// certificate and leaves redirects to the caller.
pub fn tls_client() -> reqwest::Client {
    let loopback = SocketAddr::from(([127, 0, 0, 1], 0));
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .danger_accept_invalid_certs(true)
        .resolve("a.example.com", loopback)
        .resolve("b.example.com", loopback)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Wait until something accepts on `addr`.
pub async fn wait_for_listener(addr: SocketAddr) {
    for _ in 0..100 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on {addr}");
}

/// Send a request line verbatim; HTTP clients normalize `..` away.
pub async fn raw_get(addr: SocketAddr, target: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// Status code from a raw HTTP/1.1 response.
pub fn status_of(raw: &str) -> u16 {
    raw.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}
