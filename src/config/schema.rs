//! Configuration schema definitions.
//!
//! Every section is `#[serde(default)]` so a minimal file only names what it
//! changes.

use std::net::{AddrParseError, IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::interfaces::{parse_config, AddressConfig, ConnectionMode, InterfaceKind, PayloadError};

/// Root configuration for the service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub ap: ApConfig,
    pub interfaces: InterfacesConfig,
    /// Initial configuration of Ethernet interfaces.
    pub ethernet: InterfaceDefaults,
    /// Initial configuration of Wi-Fi interfaces.
    pub wifi: InterfaceDefaults,
    pub observability: ObservabilityConfig,
}

/// HTTP API settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// When false the service idles in the inactive state.
    pub enable_server: bool,
    pub address: String,
    pub port: u16,
    /// Path prefix when deployed behind a reverse proxy (e.g. `/netconf`).
    pub reverse_proxy_path: String,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enable_server: true,
            address: "0.0.0.0".to_string(),
            port: 8080,
            reverse_proxy_path: String::new(),
            request_timeout_secs: 30,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        let ip: IpAddr = self.address.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Prefix normalized to `/segment` form, or empty when unset.
    pub fn path_prefix(&self) -> String {
        let trimmed = self.reverse_proxy_path.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Whether switching from `self` to `other` needs a new listener.
    pub fn needs_rebind(&self, other: &ServerConfig) -> bool {
        self.address != other.address
            || self.port != other.port
            || self.path_prefix() != other.path_prefix()
            || self.request_timeout_secs != other.request_timeout_secs
            || self.max_body_bytes != other.max_body_bytes
    }

    /// Whether `other` listens on the same address and port.
    pub fn same_listener(&self, other: &ServerConfig) -> bool {
        self.address == other.address && self.port == other.port
    }
}

/// Access point settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApConfig {
    /// Hide the AP interface from configuration reads and listings.
    pub hide_in_ui: bool,
    /// Name of the dedicated AP device.
    pub interface_device: String,
    pub use_dedicated_ap: bool,
    /// Keep the hotspot up after connectivity returns.
    pub always_on: bool,
    /// Bring the hotspot up after this long without any uplink.
    pub enable_after_disconnected_secs: u64,
    pub defaults: InterfaceDefaults,
}

impl Default for ApConfig {
    fn default() -> Self {
        Self {
            hide_in_ui: false,
            interface_device: "uap0".to_string(),
            use_dedicated_ap: false,
            always_on: false,
            enable_after_disconnected_secs: 60,
            defaults: InterfaceDefaults::hotspot(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Nmcli,
    DryRun,
}

/// Interface discovery and backend settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InterfacesConfig {
    pub backend: BackendKind,
    /// Prefix nmcli invocations with `sudo`.
    pub use_sudo: bool,
    pub update_period_secs: u64,
    /// Seconds nmcli waits for a connection to come up or down.
    pub connection_wait_secs: u64,
    pub use_whitelist: bool,
    pub whitelist: Vec<String>,
    /// Devices reported by the dry-run backend.
    pub inventory: Vec<InventoryEntry>,
}

impl Default for InterfacesConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Nmcli,
            use_sudo: false,
            update_period_secs: 5,
            connection_wait_secs: 5,
            use_whitelist: false,
            whitelist: Vec::new(),
            inventory: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InventoryEntry {
    pub device: String,
    #[serde(rename = "type")]
    pub device_type: String,
}

/// Initial configuration of one interface kind, in wire form.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InterfaceDefaults {
    pub connection_type: String,
    pub ip: String,
    pub mask: String,
    pub route: String,
    pub ssid: String,
    pub passphrase: String,
}

impl Default for InterfaceDefaults {
    fn default() -> Self {
        Self {
            connection_type: ConnectionMode::Disabled.as_str().to_string(),
            ip: String::new(),
            mask: String::new(),
            route: String::new(),
            ssid: String::new(),
            passphrase: String::new(),
        }
    }
}

impl InterfaceDefaults {
    pub fn hotspot() -> Self {
        Self {
            connection_type: ConnectionMode::Ap.as_str().to_string(),
            ip: "192.168.4.1".to_string(),
            mask: "255.255.255.0".to_string(),
            route: "192.168.4.1".to_string(),
            ssid: "network-setup".to_string(),
            passphrase: String::new(),
        }
    }

    /// Wire payload for an interface of `kind`.
    pub fn to_payload(&self, kind: InterfaceKind) -> Value {
        let mut payload = json!({
            "connection_type": self.connection_type,
            "ip": self.ip,
            "mask": self.mask,
            "route": self.route,
        });
        if kind.is_wireless() {
            payload["ssid"] = json!(self.ssid);
            payload["passphrase"] = json!(self.passphrase);
        }
        payload
    }

    pub fn to_config(&self, kind: InterfaceKind) -> Result<AddressConfig, PayloadError> {
        parse_config(kind, &self.to_payload(kind))
    }

    /// These settings with the mode forced to `ap`, for the hotspot fallback.
    pub fn to_hotspot_config(&self, kind: InterfaceKind) -> Result<AddressConfig, PayloadError> {
        let mut payload = self.to_payload(kind);
        payload["connection_type"] = json!(ConnectionMode::Ap.as_str());
        parse_config(kind, &payload)
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Emit JSON lines instead of human readable logs.
    pub json_logs: bool,
    pub metrics_enabled: bool,
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
