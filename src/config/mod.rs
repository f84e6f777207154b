//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! network-configuration.default.toml  +  --config <file>
//!     → loader.rs (parse, merge tables, deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → supervisor applies visibility and server changes
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - A reload that fails to load or validate keeps the current config

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError, ConfigSources, DEFAULTS_FILE};
pub use schema::{
    ApConfig, BackendKind, InterfaceDefaults, InterfacesConfig, InventoryEntry,
    ObservabilityConfig, ServerConfig, ServiceConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
