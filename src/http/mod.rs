//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing, timeout, body limit)
//!     → binding check (421) / plaintext redirect (308)
//!     → routing::RouteTable (longest prefix wins)
//!     → proxy.rs (forward to upstream)   | static_files.rs (serve asset)
//!     → response.rs / range.rs / cache.rs
//!     → Send to client
//! ```

pub mod cache;
pub mod proxy;
pub mod range;
pub mod request;
pub mod response;
pub mod server;
pub mod static_files;

pub use request::{Scheme, X_REQUEST_ID};
pub use server::HttpServer;
