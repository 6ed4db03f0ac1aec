//! Header manipulation for forwarded requests.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Add X-Forwarded-For, X-Real-IP, X-Forwarded-Proto, X-Forwarded-Host
//!
//! # Design Decisions
//! - `Host` is never rewritten; the upstream sees the name the client used
//! - Incoming X-Forwarded-For is discarded unless the router sits behind a
//!   trusted proxy (`security.trust_forwarded_headers`)

use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::http::request::Scheme;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove connection-scoped headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP.iter().chain(listed.iter()) {
        headers.remove(name);
    }
}

/// Describe the original client to the upstream.
pub fn apply_forwarded(
    headers: &mut HeaderMap,
    client: IpAddr,
    scheme: Scheme,
    host: Option<&str>,
    trust_existing: bool,
) {
    let client_str = client.to_string();

    let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if trust_existing && !existing.trim().is_empty() => {
            format!("{}, {}", existing.trim(), client_str)
        }
        _ => client_str.clone(),
    };

    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Ok(value) = HeaderValue::from_str(&client_str) {
        headers.insert(X_REAL_IP, value);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(scheme.as_str()));

    match host.and_then(|h| HeaderValue::from_str(h).ok()) {
        Some(value) => {
            headers.insert(X_FORWARDED_HOST, value);
        }
        None => {
            headers.remove(X_FORWARDED_HOST);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_standard_and_listed_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-session"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session", HeaderValue::from_static("abc"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::HOST, HeaderValue::from_static("video.example.com"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));

        strip_hop_by_hop(&mut headers);

        assert!(!headers.contains_key(header::CONNECTION));
        assert!(!headers.contains_key("keep-alive"));
        assert!(!headers.contains_key("x-session"));
        assert!(!headers.contains_key(header::TRANSFER_ENCODING));
        assert_eq!(headers[header::HOST], "video.example.com");
        assert_eq!(headers[header::CONTENT_LENGTH], "42");
    }

    #[test]
    fn forwarded_headers_replace_untrusted_chain() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("6.6.6.6"));

        apply_forwarded(
            &mut headers,
            "10.0.0.7".parse().unwrap(),
            Scheme::Https,
            Some("video.example.com"),
            false,
        );

        assert_eq!(headers[&X_FORWARDED_FOR], "10.0.0.7");
        assert_eq!(headers[&X_REAL_IP], "10.0.0.7");
        assert_eq!(headers[&X_FORWARDED_PROTO], "https");
        assert_eq!(headers[&X_FORWARDED_HOST], "video.example.com");
    }

    #[test]
    fn forwarded_for_appends_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9"));

        apply_forwarded(&mut headers, "10.0.0.7".parse().unwrap(), Scheme::Http, None, true);

        assert_eq!(headers[&X_FORWARDED_FOR], "203.0.113.9, 10.0.0.7");
        assert_eq!(headers[&X_FORWARDED_PROTO], "http");
        assert!(!headers.contains_key(&X_FORWARDED_HOST));
    }
}
