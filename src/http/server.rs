//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router for the plaintext and TLS listeners
//! - Wire up middleware (request ID, tracing, body limit)
//! - Check the host binding, redirect plaintext when required
//! - Dispatch matched routes to the proxy or the static file server
//! - Record metrics and access lines per request
//! - Run background tasks (health monitor, config updates) with the server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Extension, Router,
};
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::schema::RouterConfig;
use crate::config::store::{ConfigStore, ReloadError, Snapshot};
use crate::health::active::HealthMonitor;
use crate::health::passive;
use crate::http::proxy::{self, ForwardContext, ProxyError};
use crate::http::request::{request_host, request_id, Scheme};
use crate::http::response::{misdirected, redirect_to_https};
use crate::http::static_files;
use crate::lifecycle::reload::Reloader;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{ClientAddr, Listener};
use crate::net::tls::TlsSupervisor;
use crate::observability::metrics;
use crate::routing::RouteTarget;
use crate::security::limits::enforce_body_limit;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
}

/// The edge router's HTTP front.
pub struct HttpServer {
    app: Router,
    store: Arc<ConfigStore>,
    tls: Arc<TlsSupervisor>,
    reloader: Arc<Reloader>,
    connections: ConnectionTracker,
}

impl HttpServer {
    /// Validate and compile `config` into the first snapshot.
    pub async fn new(config: RouterConfig) -> Result<Self, ReloadError> {
        let snapshot = Snapshot::prepare(config, None).await?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let tls_address: Option<SocketAddr> = snapshot.config.listener.tls_bind_address.parse().ok();

        let store = Arc::new(ConfigStore::new(snapshot));
        let app = build_router(Arc::clone(&store), Scheme::Http);
        let tls_app = build_router(Arc::clone(&store), Scheme::Https);
        let tls = Arc::new(TlsSupervisor::new(tls_address, tls_app));
        let reloader = Arc::new(Reloader::new(Arc::clone(&store), Arc::clone(&tls)));

        Self {
            app,
            store,
            tls,
            reloader,
            connections: ConnectionTracker::new(),
        }
    }

    pub fn store(&self) -> Arc<ConfigStore> {
        Arc::clone(&self.store)
    }

    pub fn reloader(&self) -> Arc<Reloader> {
        Arc::clone(&self.reloader)
    }

    /// Tracker to hand to the plaintext [`Listener`].
    pub fn connections(&self) -> ConnectionTracker {
        self.connections.clone()
    }

    /// Run the server until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut config_updates: mpsc::UnboundedReceiver<RouterConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = axum::serve::Listener::local_addr(&listener)?;
        tracing::info!(address = %addr, "HTTP server starting");

        // A certificate that cannot be served is fatal at startup.
        self.tls
            .activate(&self.store.load().binding)
            .await
            .map_err(std::io::Error::other)?;

        tokio::spawn(HealthMonitor::new(Arc::clone(&self.store)).run(shutdown.resubscribe()));

        let reloader = Arc::clone(&self.reloader);
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                // Failures are logged by the reloader; the old snapshot stays live.
                let _ = reloader.apply(config).await;
            }
        });

        let tls = Arc::clone(&self.tls);
        let grace = Duration::from_secs(self.store.load().config.timeouts.shutdown_grace_secs);
        axum::serve(listener, self.app.into_make_service_with_connect_info::<ClientAddr>())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
                tls.shutdown(grace);
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// There is no whole-request timeout layer: a proxied upload may run for
/// hours while it keeps moving. Proxied requests are bounded by the upstream
/// stage timeouts and static responses by `timeouts.request_secs`.
pub fn build_router(store: Arc<ConfigStore>, scheme: Scheme) -> Router {
    let state = AppState {
        store: Arc::clone(&store),
    };

    Router::new()
        .route("/", any(dispatch))
        .route("/{*path}", any(dispatch))
        .layer(middleware::from_fn_with_state(store, enforce_body_limit))
        .layer(Extension(scheme))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        request_id = %request_id(req),
                        method = %req.method(),
                        uri = %req.uri(),
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

/// Main handler: binding check, route match, proxy or static dispatch.
async fn dispatch(
    State(state): State<AppState>,
    Extension(scheme): Extension<Scheme>,
    ConnectInfo(ClientAddr(client)): ConnectInfo<ClientAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    // One snapshot for the whole request, whatever reloads happen meanwhile.
    let snapshot = state.store.load();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let host = request_host(&request).map(str::to_string);

    if !snapshot.binding.accepts(host.as_deref()) {
        tracing::warn!(host = ?host, path = %path, "Request for host outside the active binding");
        metrics::record_rejected("misdirected");
        metrics::record_request(method.as_str(), 421, "none", start);
        return misdirected();
    }

    if scheme == Scheme::Http && snapshot.binding.redirects_plaintext() {
        if let Some(host) = host.as_deref() {
            let port = https_port(&snapshot.config.listener.tls_bind_address);
            metrics::record_request(method.as_str(), 308, "redirect", start);
            return redirect_to_https(host, request.uri().path_and_query(), port);
        }
    }

    let Some(route) = snapshot.routes.match_request(&request) else {
        tracing::warn!(path = %path, "No route matched");
        metrics::record_request(method.as_str(), 404, "none", start);
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };

    let response = match &route.target {
        RouteTarget::Proxy { upstream } => {
            let ctx = ForwardContext {
                client,
                scheme,
                host: host.as_deref(),
                trust_forwarded_headers: snapshot.config.security.trust_forwarded_headers,
            };
            proxy_to(&snapshot, upstream, request, &ctx).await
        }
        RouteTarget::Static(target) => {
            let relative = route.relative_path(&path);
            let deadline = Duration::from_secs(snapshot.config.timeouts.request_secs);
            let served = tokio::time::timeout(
                deadline,
                static_files::serve(target, relative, &method, request.headers()),
            )
            .await;
            match served {
                Err(_) => {
                    tracing::warn!(path = %path, timeout = ?deadline, "Static response not ready in time");
                    StatusCode::REQUEST_TIMEOUT.into_response()
                }
                Ok(Ok(response)) => {
                    if method != axum::http::Method::HEAD {
                        if let Some(len) = content_length(&response) {
                            metrics::record_static_bytes(&route.name, len);
                        }
                    }
                    response
                }
                Ok(Err(e)) => e.into_response(),
            }
        }
    };

    let status = response.status();
    metrics::record_request(method.as_str(), status.as_u16(), &route.name, start);
    if route.access_log {
        tracing::info!(
            target: "access",
            client = %client.ip(),
            method = %method,
            path = %path,
            status = status.as_u16(),
            route = %route.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request completed"
        );
    }
    response
}

async fn proxy_to(
    snapshot: &Snapshot,
    upstream_name: &str,
    request: Request<Body>,
    ctx: &ForwardContext<'_>,
) -> Response {
    let Some(upstream) = snapshot.upstreams.get(upstream_name) else {
        let err = ProxyError::UnknownUpstream(upstream_name.to_string());
        tracing::error!(error = %err, "Route points at a missing upstream");
        return err.into_response();
    };

    let health_config = &snapshot.config.health_check;
    match proxy::forward(upstream, request, ctx).await {
        Ok(response) => {
            passive::observe(upstream, Ok(response.status()), health_config);
            response
        }
        Err(e) => {
            passive::observe(upstream, Err(&e), health_config);
            match &e {
                ProxyError::PayloadTooLarge => {
                    tracing::warn!(upstream = %upstream.name, "Request body crossed the size limit");
                    metrics::record_rejected("payload_too_large");
                }
                ProxyError::ClientAborted => {
                    tracing::info!(upstream = %upstream.name, "Client went away mid-upload");
                }
                _ => tracing::error!(upstream = %upstream.name, error = %e, "Upstream request failed"),
            }
            e.into_response()
        }
    }
}

fn content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn https_port(tls_bind_address: &str) -> u16 {
    tls_bind_address
        .parse::<SocketAddr>()
        .map(|addr| addr.port())
        .unwrap_or(443)
}
