//! Upstream health subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each upstream's health_check_path
//!     → Update state.rs
//!
//! Passive health checks (passive.rs):
//!     Proxied request outcome observed
//!     → Update state.rs
//!
//! State machine (state.rs):
//!     Unknown → Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary
//! - Health is reported (admin API, metrics, logs) but never blocks
//!   traffic; an unhealthy upstream still gets its requests and the
//!   client sees the real failure

pub mod active;
pub mod passive;
pub mod state;

pub use state::{HealthState, HealthTracker};
