//! Static asset serving.
//!
//! # Responsibilities
//! - Map a request path below a route prefix to a file under the asset root
//! - Refuse anything that would resolve outside that root
//! - Answer single byte ranges so players can seek (206 / 416)
//! - Attach long-lived cache headers and weak validators
//!
//! # Design Decisions
//! - Both the root and the candidate are canonicalized, so symlinks that
//!   leave the root are rejected the same way as `..` segments
//! - Traversal attempts are answered with 404, never 403, so the layout
//!   of the filesystem is not revealed
//! - Files are streamed in fixed chunks; a multi-gigabyte video never
//!   sits in memory

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use percent_encoding::percent_decode_str;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::http::cache::{check_etag_match, etag_for, last_modified};
use crate::http::range::{parse_range_header, ByteRange, RangeParseResult};
use crate::routing::StaticTarget;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum StaticError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("not found")]
    NotFound,

    #[error("range not satisfiable for {size} byte file")]
    RangeNotSatisfiable { size: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for StaticError {
    fn into_response(self) -> Response {
        match self {
            StaticError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, "GET, HEAD")],
                "Method Not Allowed",
            )
                .into_response(),
            StaticError::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            StaticError::RangeNotSatisfiable { size } => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(header::CONTENT_RANGE, format!("bytes */{size}"))],
            )
                .into_response(),
            StaticError::Io(e) => {
                tracing::error!(error = %e, "Static file read failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

/// Resolve `relative` (still percent-encoded) to a file inside `root`.
pub async fn resolve_path(root: &Path, relative: &str) -> Result<PathBuf, StaticError> {
    let decoded = percent_decode_str(relative)
        .decode_utf8()
        .map_err(|_| StaticError::NotFound)?;

    if decoded.contains('\0') || decoded.contains('\\') {
        tracing::warn!(path = %relative, "Rejected malformed asset path");
        return Err(StaticError::NotFound);
    }

    let mut candidate = root.to_path_buf();
    let mut depth = 0usize;
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                tracing::warn!(path = %relative, "Rejected asset path traversal");
                return Err(StaticError::NotFound);
            }
            segment => {
                candidate.push(segment);
                depth += 1;
            }
        }
    }
    if depth == 0 {
        return Err(StaticError::NotFound);
    }

    let canonical_root = tokio::fs::canonicalize(root).await.map_err(|e| {
        tracing::error!(root = ?root, error = %e, "Asset root is not accessible");
        StaticError::NotFound
    })?;
    let resolved = match tokio::fs::canonicalize(&candidate).await {
        Ok(path) => path,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(StaticError::NotFound),
        Err(e) => return Err(StaticError::Io(e)),
    };

    if !resolved.starts_with(&canonical_root) {
        tracing::warn!(path = %relative, "Rejected asset path resolving outside root");
        return Err(StaticError::NotFound);
    }
    Ok(resolved)
}

fn extension_allowed(target: &StaticTarget, path: &Path) -> bool {
    if target.allowed_extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| target.allowed_extensions.iter().any(|a| *a == e))
}

/// Serve the asset at `relative` below `target`'s root.
pub async fn serve(
    target: &StaticTarget,
    relative: &str,
    method: &Method,
    headers: &HeaderMap,
) -> Result<Response, StaticError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(StaticError::MethodNotAllowed);
    }

    let path = resolve_path(&target.root, relative).await?;
    if !extension_allowed(target, &path) {
        return Err(StaticError::NotFound);
    }

    let mut file = File::open(&path).await?;
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(StaticError::NotFound);
    }

    let size = metadata.len();
    let etag = etag_for(&metadata);
    let modified = last_modified(&metadata);

    let mut builder = Response::builder()
        .header(header::ETAG, &etag)
        .header(header::CACHE_CONTROL, target.cache.to_header_value());
    if let Some(modified) = &modified {
        builder = builder.header(header::LAST_MODIFIED, modified);
    }
    if let Some(origin) = &target.cors_allow_origin {
        builder = builder.header(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }

    let if_none_match = headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok());
    if check_etag_match(if_none_match, &etag) {
        return Ok(builder
            .status(StatusCode::NOT_MODIFIED)
            .body(Body::empty())
            .map_err(into_io)?);
    }

    let range = if range_applies(headers, modified.as_deref()) {
        let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
        parse_range_header(range_header, size)
    } else {
        RangeParseResult::None
    };

    let (status, span) = match range {
        RangeParseResult::Valid(range) => (StatusCode::PARTIAL_CONTENT, range),
        RangeParseResult::NotSatisfiable => return Err(StaticError::RangeNotSatisfiable { size }),
        RangeParseResult::None => {
            if size == 0 {
                let response = builder
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, content_type(&path))
                    .header(header::ACCEPT_RANGES, "bytes")
                    .header(header::CONTENT_LENGTH, 0)
                    .body(Body::empty())
                    .map_err(into_io)?;
                return Ok(response);
            }
            (StatusCode::OK, ByteRange { start: 0, end: size - 1 })
        }
    };

    builder = builder
        .status(status)
        .header(header::CONTENT_TYPE, content_type(&path))
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, span.len());
    if status == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(header::CONTENT_RANGE, span.content_range(size));
    }

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        if span.start > 0 {
            file.seek(SeekFrom::Start(span.start)).await?;
        }
        file_body(file, span.len())
    };

    builder.body(body).map_err(into_io)
}

/// `If-Range` keeps the range only while the validator still matches.
///
/// The comparison is strong (RFC 9110 §13.1.5). The entity tags issued here
/// are all weak, so only an exact `Last-Modified` date can match.
fn range_applies(headers: &HeaderMap, modified: Option<&str>) -> bool {
    match headers.get(header::IF_RANGE).and_then(|v| v.to_str().ok()) {
        None => true,
        Some(validator) => modified.is_some_and(|date| validator.trim() == date),
    }
}

fn content_type(path: &Path) -> HeaderValue {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    HeaderValue::from_str(mime.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

fn into_io(e: axum::http::Error) -> StaticError {
    StaticError::Io(std::io::Error::other(e))
}

/// Stream `len` bytes from the file's current position.
fn file_body(file: File, len: u64) -> Body {
    let chunks = stream::unfold((file, len), |(mut file, remaining)| async move {
        if remaining == 0 {
            return None;
        }
        let mut buf = vec![0u8; remaining.min(CHUNK_SIZE as u64) as usize];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok::<_, std::io::Error>(Bytes::from(buf)), (file, remaining - n as u64)))
            }
            Err(e) => Some((Err(e), (file, 0))),
        }
    });
    Body::from_stream(chunks)
}
