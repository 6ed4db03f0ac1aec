//! HTTP cache control module
//!
//! Provides validators (`ETag`, `Last-Modified`) and `Cache-Control` values
//! for static assets.

use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// Cache directive attached to a static route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age_secs: u64,
    /// Content never changes once published.
    pub immutable: bool,
}

impl CachePolicy {
    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        if self.immutable {
            format!("public, max-age={}, immutable", self.max_age_secs)
        } else {
            format!("public, max-age={}", self.max_age_secs)
        }
    }
}

/// Weak `ETag` derived from file size and modification time.
///
/// Files are never read to compute it, so multi-gigabyte videos cost nothing.
pub fn etag_for(metadata: &Metadata) -> String {
    let mtime = modified_secs(metadata).unwrap_or(0);
    format!("W/\"{:x}-{:x}\"", metadata.len(), mtime)
}

/// `Last-Modified` value in IMF-fixdate format.
pub fn last_modified(metadata: &Metadata) -> Option<String> {
    let modified = metadata.modified().ok()?;
    let datetime: DateTime<Utc> = modified.into();
    Some(datetime.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

fn modified_secs(metadata: &Metadata) -> Option<u64> {
    metadata
        .modified()
        .ok()
        .and_then(|t: SystemTime| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports:
/// - Single `ETag`: `"abc123"`
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Wildcard: `*`
///
/// Comparison is weak, as required for `If-None-Match`.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    let ours = etag.trim_start_matches("W/");
    if_none_match.is_some_and(|client_etag| {
        client_etag
            .split(',')
            .map(str::trim)
            .any(|e| e == "*" || e.trim_start_matches("W/") == ours)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_etag_match() {
        let etag = "W/\"abc123\"";
        assert!(check_etag_match(Some("W/\"abc123\""), etag));
        assert!(check_etag_match(Some("\"abc123\""), etag));
        assert!(check_etag_match(Some("\"xyz\", W/\"abc123\""), etag));
        assert!(check_etag_match(Some("*"), etag));
        assert!(!check_etag_match(Some("\"different\""), etag));
        assert!(!check_etag_match(None, etag));
    }

    #[test]
    fn test_cache_policy() {
        let immutable = CachePolicy {
            max_age_secs: 31_536_000,
            immutable: true,
        };
        assert_eq!(
            immutable.to_header_value(),
            "public, max-age=31536000, immutable"
        );
        let short = CachePolicy {
            max_age_secs: 600,
            immutable: false,
        };
        assert_eq!(short.to_header_value(), "public, max-age=600");
    }

    #[test]
    fn validators_from_metadata() {
        let path = std::env::temp_dir().join(format!("edge-router-cache-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"hello world").unwrap();
        let metadata = std::fs::metadata(&path).unwrap();

        let etag = etag_for(&metadata);
        assert!(etag.starts_with("W/\"b-"));
        assert_eq!(etag, etag_for(&std::fs::metadata(&path).unwrap()));
        assert!(last_modified(&metadata).unwrap().ends_with(" GMT"));

        std::fs::remove_file(&path).unwrap();
    }
}
