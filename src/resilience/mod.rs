//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → connector (connect timeout)
//!     → timeouts.rs (request body idle timeout while uploading)
//!     → response head deadline (read timeout)
//!     → timeouts.rs (response body idle timeout while downloading)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream stage has a deadline
//! - Failed requests are never retried: uploads are not replayable and
//!   the operator sees every failure

pub mod timeouts;
