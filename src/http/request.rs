//! Request inspection helpers.
//!
//! # Responsibilities
//! - Extract routing-relevant information (host, scheme)
//! - Expose the request ID assigned by the request-id middleware
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Host comes from the `Host` header, falling back to the URI authority (HTTP/2)

use axum::body::Body;
use axum::http::{header, HeaderName, Request};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Which listener a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host the client addressed, including any port.
pub fn request_host(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .filter(|h| !h.is_empty())
}

/// Drop the port from a host value; IPv6 literals keep their brackets.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// The request ID set by the request-id layer, or `"unknown"`.
pub fn request_id(req: &Request<Body>) -> &str {
    req.headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ports() {
        assert_eq!(strip_port("example.com:8080"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("[::1]:443"), "[::1]");
        assert_eq!(strip_port("[::1]"), "[::1]");
    }

    #[test]
    fn host_falls_back_to_authority() {
        let req = Request::builder()
            .uri("http://video.example.com/videos/a.mp4")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&req), Some("video.example.com"));

        let req = Request::builder()
            .uri("/videos/a.mp4")
            .header("Host", "other.example.com:80")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&req), Some("other.example.com:80"));
    }

    #[test]
    fn missing_request_id() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(request_id(&req), "unknown");
    }
}
