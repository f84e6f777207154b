//! Host networking backends.
//!
//! # Responsibilities
//! - Enumerate the host's network devices at startup and report what they
//!   are already configured as
//! - Probe link state for the status monitor
//! - Push committed configuration to the host networking stack
//!
//! # Design Decisions
//! - The configuration authority only sees [`NetworkApplier`]; discovery and
//!   probing go through [`InterfaceSource`]
//! - Calls are blocking; async callers move them onto the blocking pool
//! - A failed apply never rolls back the in-memory commit

pub mod dry_run;
pub mod nmcli;

use std::net::Ipv4Addr;

use crate::authority::ChangeSet;
use crate::interfaces::{AddressConfig, Interface, InterfaceKind, LinkState};

pub use dry_run::DryRunBackend;
pub use nmcli::NmcliBackend;

/// Failure of a backend operation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {stderr}", exit_code(.code))]
    Command {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("unexpected output from `{command}`: {line}")]
    Parse { command: String, line: String },
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("status {}", c))
}

/// A device reported by the host, before it is turned into an [`Interface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub device: String,
    /// Backend device type (`ethernet`, `wifi`, `__ap`, `loopback`, ...).
    pub device_type: String,
}

impl DiscoveredDevice {
    pub fn new(device: impl Into<String>, device_type: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            device_type: device_type.into(),
        }
    }
}

/// One probed link state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusObservation {
    pub device: String,
    pub link: LinkState,
    pub ipv4: Option<Ipv4Addr>,
}

/// Enumerates and probes host network devices.
pub trait InterfaceSource: Send + Sync {
    fn discover(&self) -> Result<Vec<DiscoveredDevice>, BackendError>;

    fn probe(&self) -> Result<Vec<StatusObservation>, BackendError>;

    /// Configuration the host already runs on `device`. `None` when nothing
    /// has been set up for it yet, in which case the configured defaults
    /// apply.
    fn current_config(
        &self,
        _device: &str,
        _kind: InterfaceKind,
    ) -> Result<Option<AddressConfig>, BackendError> {
        Ok(None)
    }
}

/// Physically applies committed configuration to the host.
pub trait NetworkApplier: Send + Sync {
    /// Called once at startup with the registry contents so the backend can
    /// create whatever per-interface state it needs.
    fn prepare(&self, _interfaces: &[Interface]) -> Result<(), BackendError> {
        Ok(())
    }

    /// Called once per accepted request, after the in-memory commit.
    fn apply(&self, changes: &ChangeSet) -> Result<(), BackendError>;
}
