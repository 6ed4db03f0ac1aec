//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path, headers)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: matched Route (Proxy | Static) or NoMatch
//!
//! Route Compilation (at load and on every reload):
//!     RouteConfig[]
//!     → Normalize prefixes
//!     → Sort by specificity
//!     → Freeze as immutable RouteTable inside a config snapshot
//! ```
//!
//! # Design Decisions
//! - Routes compiled per snapshot, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Longest prefix wins

pub mod matcher;
pub mod router;

pub use router::{Route, RouteTable, RouteTarget, StaticTarget};
