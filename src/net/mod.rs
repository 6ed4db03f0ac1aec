//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection (plaintext)
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (lifecycle tracking)
//!     → Hand off to HTTP layer
//!
//! Incoming TCP connection (TLS)
//!     → tls.rs (axum-server rustls acceptor, certificate of the active binding)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - The TLS listener starts only once a binding carries a certificate

pub mod connection;
pub mod listener;
pub mod tls;

pub use listener::{ClientAddr, Listener};
