//! Edge router for a video upload and conversion service.
//!
//! Terminates HTTP(S) for one bound domain, serves uploaded and converted
//! videos straight from disk, and proxies everything else to the
//! application server.

// Core subsystems
pub mod binding;
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Traffic management
pub mod health;
pub mod upstream;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::RouterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
