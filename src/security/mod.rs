//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (body size: declared length up front, streamed bodies cut)
//!     → [binding check, routing]
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*) on the way upstream
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client-supplied forwarding headers by default
//! - Authentication and rate limiting of uploads belong to the application

pub mod headers;
pub mod limits;
