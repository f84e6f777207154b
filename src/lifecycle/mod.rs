//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Build backend → Enumerate devices → Adopt host state → Seed registry → Authority
//!
//! Supervision (supervisor.rs):
//!     Active ⇄ Inactive, driven by `server.enable_server` and reloads
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → broadcast → server drains, monitor stops
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then interfaces, then listeners
//! - A disabled server is an explicit state, left on reload

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use shutdown::Shutdown;
pub use signals::spawn_signal_handler;
pub use startup::{
    adopt_host_state, bootstrap, build_backend, discover_interfaces, Bootstrap, StartupError,
};
pub use supervisor::{ServiceState, Supervisor, SupervisorError};
