//! Interface registry subsystem.
//!
//! # Data Flow
//! ```text
//! startup enumeration (backend)
//!     → types.rs (Interface, AddressConfig)
//!     → registry.rs (ordered, unique by device)
//!
//! write request (JSON)
//!     → payload.rs (untyped → AddressConfig, shape checks)
//!     → registry.rs (kind check, replace)
//! ```
//!
//! # Design Decisions
//! - Device names are unique and fixed after startup
//! - Configuration is a tagged union keyed by interface kind
//! - Unknown payload keys are rejected, never ignored

pub mod payload;
pub mod registry;
pub mod types;

pub use payload::{parse_config, PayloadError};
pub use registry::{ConfigSnapshot, InterfaceRegistry, RegistryError, StatusSnapshot};
pub use types::{
    AddressConfig, ConnectionMode, EthernetConfig, Interface, InterfaceKind, InterfaceStatus,
    Ipv4Settings, LinkState, WirelessConfig,
};
pub use types::{netmask_prefix, prefix_netmask};
