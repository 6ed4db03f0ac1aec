//! Forwarding to upstream application servers.
//!
//! # Responsibilities
//! - Rewrite the request URI to the upstream
//! - Strip hop-by-hop headers, add forwarded headers, keep `Host`
//! - Stream both bodies without buffering, bounded by stage timeouts
//! - Map upstream failures to gateway status codes
//!
//! # Design Decisions
//! - Never retried: an upload body cannot be replayed
//! - The response-head deadline restarts with every uploaded chunk, so a
//!   long upload is not mistaken for a silent upstream
//! - The request ID set by the middleware travels with the other headers

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::InvalidUriParts;
use axum::http::{header, HeaderValue, Request, StatusCode, Version};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::sync::Notify;

use crate::http::request::Scheme;
use crate::resilience::timeouts::{
    await_with_progress, idle_timeout_body, is_idle_timeout, tracked_idle_timeout_body,
};
use crate::security::headers::{apply_forwarded, strip_hop_by_hop};
use crate::security::limits::is_body_limit_error;
use crate::upstream::Upstream;

/// Facts about the inbound connection needed to forward a request.
#[derive(Debug, Clone, Copy)]
pub struct ForwardContext<'a> {
    pub client: SocketAddr,
    pub scheme: Scheme,
    pub host: Option<&'a str>,
    pub trust_forwarded_headers: bool,
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream {0} is not configured")]
    UnknownUpstream(String),

    #[error("upstream {upstream} unreachable: {source}")]
    Unreachable {
        upstream: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("upstream {upstream} stage timed out after {timeout:?}")]
    Timeout { upstream: String, timeout: Duration },

    #[error("request body exceeds the configured limit")]
    PayloadTooLarge,

    #[error("client aborted the request body")]
    ClientAborted,

    #[error("upstream {upstream} failed: {source}")]
    Upstream {
        upstream: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("cannot build upstream URI: {0}")]
    InvalidUri(#[from] InvalidUriParts),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::ClientAborted => StatusCode::BAD_REQUEST,
            ProxyError::UnknownUpstream(_)
            | ProxyError::Unreachable { .. }
            | ProxyError::Upstream { .. }
            | ProxyError::InvalidUri(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = status.canonical_reason().unwrap_or("Bad Gateway");
        (status, reason).into_response()
    }
}

/// Forward `request` to `upstream` and stream back its response.
pub async fn forward(
    upstream: &Upstream,
    request: Request<Body>,
    ctx: &ForwardContext<'_>,
) -> Result<Response, ProxyError> {
    let (mut parts, body) = request.into_parts();

    parts.uri = upstream.uri_for(parts.uri.path_and_query())?;
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    apply_forwarded(
        &mut parts.headers,
        ctx.client.ip(),
        ctx.scheme,
        ctx.host,
        ctx.trust_forwarded_headers,
    );
    // HTTP/2 clients send the authority instead of a Host header.
    if !parts.headers.contains_key(header::HOST) {
        if let Some(value) = ctx.host.and_then(|h| HeaderValue::from_str(h).ok()) {
            parts.headers.insert(header::HOST, value);
        }
    }

    let progress = Arc::new(Notify::new());
    let body = tracked_idle_timeout_body(body, upstream.timeouts.write, Arc::clone(&progress));
    let outbound = Request::from_parts(parts, body);

    let pending = upstream.client().request(outbound);
    let response = match await_with_progress(pending, upstream.timeouts.read, &progress).await {
        None => {
            return Err(ProxyError::Timeout {
                upstream: upstream.name.clone(),
                timeout: upstream.timeouts.read,
            })
        }
        Some(Err(e)) => return Err(classify(upstream, e)),
        Some(Ok(response)) => response,
    };

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    let body = idle_timeout_body(Body::new(body), upstream.timeouts.read);
    Ok(Response::from_parts(parts, body))
}

fn classify(upstream: &Upstream, err: hyper_util::client::legacy::Error) -> ProxyError {
    if is_body_limit_error(&err) {
        ProxyError::PayloadTooLarge
    } else if is_idle_timeout(&err) {
        ProxyError::Timeout {
            upstream: upstream.name.clone(),
            timeout: upstream.timeouts.write,
        }
    } else if err.is_connect() {
        ProxyError::Unreachable {
            upstream: upstream.name.clone(),
            source: err,
        }
    } else if is_inbound_body_error(&err) {
        ProxyError::ClientAborted
    } else {
        ProxyError::Upstream {
            upstream: upstream.name.clone(),
            source: err,
        }
    }
}

/// The request body handed to hyper failed, i.e. the client went away
/// mid-upload.
fn is_inbound_body_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
            return hyper_err.is_user();
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_map_to_gateway_statuses() {
        assert_eq!(
            ProxyError::UnknownUpstream("webapp".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::Timeout {
                upstream: "webapp".into(),
                timeout: Duration::from_secs(300),
            }
            .status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ProxyError::PayloadTooLarge.into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ProxyError::ClientAborted.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn plain_errors_are_not_client_aborts() {
        let err = std::io::Error::other("reset");
        assert!(!is_inbound_body_error(&err));
    }
}
