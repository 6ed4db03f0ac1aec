//! Request body limits.
//!
//! # Responsibilities
//! - Enforce maximum request body size
//! - Reject declared oversize bodies before a byte is read
//! - Cut undeclared (chunked) bodies the moment they cross the limit
//!
//! # Design Decisions
//! - The limit is exclusive: a body of exactly `max_body_size` bytes is
//!   already too large
//! - The limit is read from the live snapshot per request, so reloads apply
//!   to the next request

use std::error::Error as StdError;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::{LengthLimitError, Limited};
use thiserror::Error;

use crate::config::store::ConfigStore;
use crate::observability::metrics;

#[derive(Debug, Error)]
#[error("request body must be smaller than {limit} bytes")]
pub struct PayloadTooLarge {
    pub limit: u64,
}

impl IntoResponse for PayloadTooLarge {
    fn into_response(self) -> Response {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").into_response()
    }
}

/// Apply `max` to the request body.
pub fn limit_body(request: Request<Body>, max: u64) -> Result<Request<Body>, PayloadTooLarge> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    if declared.is_some_and(|len| len >= max) {
        return Err(PayloadTooLarge { limit: max });
    }

    let allowed = usize::try_from(max.saturating_sub(1)).unwrap_or(usize::MAX);
    Ok(request.map(|body| Body::new(Limited::new(body, allowed))))
}

/// Middleware form of [`limit_body`] reading the limit from the live snapshot.
pub async fn enforce_body_limit(
    State(store): State<Arc<ConfigStore>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let max = store.load().config.security.max_body_size;
    match limit_body(request, max) {
        Ok(request) => next.run(request).await,
        Err(rejection) => {
            tracing::warn!(limit = max, "Rejected request with oversize declared body");
            metrics::record_rejected("payload_too_large");
            rejection.into_response()
        }
    }
}

/// Whether `err`, or anything it wraps, is a body limit violation.
pub fn is_body_limit_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.downcast_ref::<LengthLimitError>().is_some() {
            return true;
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: &'static str, declared: Option<u64>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/upload");
        if let Some(len) = declared {
            builder = builder.header(header::CONTENT_LENGTH, len);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[test]
    fn declared_length_checked_up_front() {
        assert!(limit_body(request("", Some(100)), 100).is_err());
        assert!(limit_body(request("", Some(101)), 100).is_err());
        assert!(limit_body(request("", Some(99)), 100).is_ok());
    }

    #[tokio::test]
    async fn streamed_body_cut_at_limit() {
        let limited = limit_body(request("0123456789", None), 10).unwrap();
        let err = axum::body::to_bytes(limited.into_body(), usize::MAX)
            .await
            .unwrap_err();
        assert!(is_body_limit_error(&err));

        let limited = limit_body(request("012345678", None), 10).unwrap();
        let bytes = axum::body::to_bytes(limited.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes, "012345678");
    }

    #[test]
    fn unrelated_errors_are_not_limit_errors() {
        let err = std::io::Error::other("boom");
        assert!(!is_body_limit_error(&err));
    }
}
