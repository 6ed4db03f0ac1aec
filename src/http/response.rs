//! Router-generated responses.
//!
//! # Responsibilities
//! - Answer requests for hosts outside the active binding (421)
//! - Redirect plaintext requests to the TLS endpoint (308)
//!
//! # Design Decisions
//! - 308 keeps the method and body, so a redirected upload is retried as
//!   an upload rather than turned into a GET

use axum::http::uri::PathAndQuery;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::request::strip_port;

pub fn misdirected() -> Response {
    (StatusCode::MISDIRECTED_REQUEST, "Misdirected Request").into_response()
}

/// Redirect to the same resource on the TLS listener.
pub fn redirect_to_https(host: &str, path_and_query: Option<&PathAndQuery>, https_port: u16) -> Response {
    let name = strip_port(host);
    let authority = if https_port == 443 {
        name.to_string()
    } else {
        format!("{name}:{https_port}")
    };
    let target = path_and_query.map(PathAndQuery::as_str).unwrap_or("/");
    let location = format!("https://{authority}{target}");

    (StatusCode::PERMANENT_REDIRECT, [(header::LOCATION, location)]).into_response()
}
