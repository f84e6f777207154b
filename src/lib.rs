//! Network configuration service.
//!
//! Exposes the host's network interfaces over an HTTP API: read status and
//! configuration, push new configuration, list interfaces. One access-point
//! interface can be hidden from callers.

pub mod authority;
pub mod backend;
pub mod config;
pub mod http;
pub mod interfaces;
pub mod lifecycle;
pub mod monitor;
pub mod observability;

pub use authority::ConfigAuthority;
pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
