//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Matched proxy route (upstream name)
//!     → pool.rs (lookup by name in the live snapshot)
//!     → backend.rs (URI rewrite, pooled client, stage timeouts)
//!     → http::proxy (forward)
//! ```
//!
//! # Design Decisions
//! - One upstream per name; there is nothing to balance between
//! - Health is tracked per upstream and reported, never used to refuse traffic

pub mod backend;
pub mod pool;

pub use backend::{StageTimeouts, Upstream};
pub use pool::UpstreamPool;
