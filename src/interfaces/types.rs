//! Interface domain types.
//!
//! Every interface has a hardware [`InterfaceKind`] that fixes the shape of
//! its [`AddressConfig`] and the [`ConnectionMode`]s it may run in. The
//! address configuration is a tagged union keyed by kind; the untyped wire
//! form is converted into it by [`crate::interfaces::payload`].

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Hardware category of a network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Ethernet,
    Wifi,
    /// Dedicated access-point device.
    Ap,
}

impl InterfaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InterfaceKind::Ethernet => "ethernet",
            InterfaceKind::Wifi => "wifi",
            InterfaceKind::Ap => "ap",
        }
    }

    /// Modes an interface of this kind may be configured with.
    pub fn allowed_modes(self) -> &'static [ConnectionMode] {
        match self {
            InterfaceKind::Ethernet => &[
                ConnectionMode::Disabled,
                ConnectionMode::StaticIp,
                ConnectionMode::DynamicIp,
                ConnectionMode::DhcpServer,
            ],
            InterfaceKind::Wifi => &[
                ConnectionMode::Disabled,
                ConnectionMode::Station,
                ConnectionMode::Ap,
            ],
            InterfaceKind::Ap => &[ConnectionMode::Disabled, ConnectionMode::Ap],
        }
    }

    pub fn allows(self, mode: ConnectionMode) -> bool {
        self.allowed_modes().contains(&mode)
    }

    pub fn is_wireless(self) -> bool {
        !matches!(self, InterfaceKind::Ethernet)
    }
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection mode of an interface.
///
/// A closed set of mutually exclusive modes. The derived ordering follows the
/// declaration order and is used wherever modes are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    Disabled,
    StaticIp,
    DynamicIp,
    DhcpServer,
    Station,
    Ap,
}

impl ConnectionMode {
    pub const ALL: [ConnectionMode; 6] = [
        ConnectionMode::Disabled,
        ConnectionMode::StaticIp,
        ConnectionMode::DynamicIp,
        ConnectionMode::DhcpServer,
        ConnectionMode::Station,
        ConnectionMode::Ap,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionMode::Disabled => "disabled",
            ConnectionMode::StaticIp => "static_ip",
            ConnectionMode::DynamicIp => "dynamic_ip",
            ConnectionMode::DhcpServer => "dhcp_server",
            ConnectionMode::Station => "station",
            ConnectionMode::Ap => "ap",
        }
    }

    /// True when the mode assigns the configured `ip`/`mask`/`route` to the
    /// interface itself.
    pub fn carries_address(self) -> bool {
        matches!(
            self,
            ConnectionMode::StaticIp | ConnectionMode::DhcpServer | ConnectionMode::Ap
        )
    }

    pub fn requires_ssid(self) -> bool {
        matches!(self, ConnectionMode::Station | ConnectionMode::Ap)
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConnectionMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown connection type `{}`", s))
    }
}

/// IPv4 addressing of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Settings {
    pub ip: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub route: Ipv4Addr,
}

impl Ipv4Settings {
    pub fn unspecified() -> Self {
        Self {
            ip: Ipv4Addr::UNSPECIFIED,
            mask: Ipv4Addr::UNSPECIFIED,
            route: Ipv4Addr::UNSPECIFIED,
        }
    }

    /// Prefix length of the mask, or `None` if the mask is not contiguous.
    pub fn prefix_len(&self) -> Option<u8> {
        netmask_prefix(self.mask)
    }

    /// Address in CIDR notation (`10.0.0.5/24`).
    pub fn cidr(&self) -> Option<String> {
        self.prefix_len().map(|bits| format!("{}/{}", self.ip, bits))
    }
}

/// Netmask with `bits` leading ones, or `None` above 32.
pub fn prefix_netmask(bits: u8) -> Option<Ipv4Addr> {
    if bits > 32 {
        return None;
    }
    Some(Ipv4Addr::from(u32::MAX.checked_shl(32 - u32::from(bits)).unwrap_or(0)))
}

/// Prefix length of a contiguous netmask.
pub fn netmask_prefix(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones();
    // Contiguous iff every bit after the leading ones is zero.
    if bits.checked_shl(ones).unwrap_or(0) == 0 {
        Some(ones as u8)
    } else {
        None
    }
}

/// Configuration of a wired interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EthernetConfig {
    pub connection_type: ConnectionMode,
    #[serde(flatten)]
    pub ipv4: Ipv4Settings,
}

/// Configuration of a wireless interface (station or access point).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WirelessConfig {
    pub connection_type: ConnectionMode,
    #[serde(flatten)]
    pub ipv4: Ipv4Settings,
    pub ssid: String,
    pub passphrase: String,
}

/// Typed configuration payload of one interface, tagged by interface kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AddressConfig {
    Ethernet(EthernetConfig),
    Wifi(WirelessConfig),
    Ap(WirelessConfig),
}

impl AddressConfig {
    pub fn kind(&self) -> InterfaceKind {
        match self {
            AddressConfig::Ethernet(_) => InterfaceKind::Ethernet,
            AddressConfig::Wifi(_) => InterfaceKind::Wifi,
            AddressConfig::Ap(_) => InterfaceKind::Ap,
        }
    }

    pub fn mode(&self) -> ConnectionMode {
        match self {
            AddressConfig::Ethernet(c) => c.connection_type,
            AddressConfig::Wifi(c) | AddressConfig::Ap(c) => c.connection_type,
        }
    }

    pub fn ipv4(&self) -> &Ipv4Settings {
        match self {
            AddressConfig::Ethernet(c) => &c.ipv4,
            AddressConfig::Wifi(c) | AddressConfig::Ap(c) => &c.ipv4,
        }
    }

    pub fn wireless(&self) -> Option<&WirelessConfig> {
        match self {
            AddressConfig::Ethernet(_) => None,
            AddressConfig::Wifi(c) | AddressConfig::Ap(c) => Some(c),
        }
    }

    /// Same configuration with another mode; the rest of the payload is kept.
    /// Returns `None` if the kind does not allow `mode`.
    pub fn with_mode(&self, mode: ConnectionMode) -> Option<AddressConfig> {
        if !self.kind().allows(mode) {
            return None;
        }
        let mut next = self.clone();
        match &mut next {
            AddressConfig::Ethernet(c) => c.connection_type = mode,
            AddressConfig::Wifi(c) | AddressConfig::Ap(c) => c.connection_type = mode,
        }
        Some(next)
    }
}

/// Runtime link state as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Connected,
    Connecting,
    Disconnected,
    Unavailable,
    Unmanaged,
    #[default]
    Unknown,
}

impl LinkState {
    /// Parse a NetworkManager device state such as `connected`,
    /// `connecting (getting IP configuration)` or `connected (externally)`.
    pub fn parse(state: &str) -> Self {
        let word = state.split_whitespace().next().unwrap_or_default();
        match word {
            "connected" => LinkState::Connected,
            "connecting" => LinkState::Connecting,
            "disconnected" | "deactivating" => LinkState::Disconnected,
            "unavailable" => LinkState::Unavailable,
            "unmanaged" => LinkState::Unmanaged,
            _ => LinkState::Unknown,
        }
    }

    pub fn is_connected(self) -> bool {
        self == LinkState::Connected
    }
}

/// Last observed runtime state of an interface.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct InterfaceStatus {
    pub status: LinkState,
    pub message: String,
    pub error: bool,
    pub ipv4: Option<Ipv4Addr>,
}

/// A network interface known to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub device: String,
    pub kind: InterfaceKind,
    pub config: AddressConfig,
    pub status: InterfaceStatus,
}

impl Interface {
    pub fn new(device: impl Into<String>, config: AddressConfig) -> Self {
        Self {
            device: device.into(),
            kind: config.kind(),
            config,
            status: InterfaceStatus::default(),
        }
    }

    pub fn mode(&self) -> ConnectionMode {
        self.config.mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netmask_prefix_accepts_contiguous_masks() {
        assert_eq!(netmask_prefix(Ipv4Addr::new(255, 255, 255, 0)), Some(24));
        assert_eq!(netmask_prefix(Ipv4Addr::new(255, 255, 255, 255)), Some(32));
        assert_eq!(netmask_prefix(Ipv4Addr::new(0, 0, 0, 0)), Some(0));
        assert_eq!(netmask_prefix(Ipv4Addr::new(255, 255, 240, 0)), Some(20));
        assert_eq!(netmask_prefix(Ipv4Addr::new(255, 0, 255, 0)), None);
        assert_eq!(netmask_prefix(Ipv4Addr::new(0, 255, 255, 255)), None);
    }

    #[test]
    fn prefix_netmask_builds_masks() {
        assert_eq!(prefix_netmask(24), Some(Ipv4Addr::new(255, 255, 255, 0)));
        assert_eq!(prefix_netmask(32), Some(Ipv4Addr::new(255, 255, 255, 255)));
        assert_eq!(prefix_netmask(0), Some(Ipv4Addr::UNSPECIFIED));
        assert_eq!(prefix_netmask(33), None);
    }

    #[test]
    fn cidr_formatting() {
        let ipv4 = Ipv4Settings {
            ip: Ipv4Addr::new(10, 0, 0, 5),
            mask: Ipv4Addr::new(255, 255, 255, 0),
            route: Ipv4Addr::new(10, 0, 0, 1),
        };
        assert_eq!(ipv4.cidr().as_deref(), Some("10.0.0.5/24"));
    }

    #[test]
    fn modes_are_ordered_and_round_trip_names() {
        let mut sorted = ConnectionMode::ALL;
        sorted.sort();
        assert_eq!(sorted, ConnectionMode::ALL);
        for mode in ConnectionMode::ALL {
            assert_eq!(mode.as_str().parse::<ConnectionMode>(), Ok(mode));
        }
        assert!("hotspot".parse::<ConnectionMode>().is_err());
    }

    #[test]
    fn kinds_restrict_modes() {
        assert!(InterfaceKind::Ethernet.allows(ConnectionMode::DhcpServer));
        assert!(!InterfaceKind::Ethernet.allows(ConnectionMode::Station));
        assert!(InterfaceKind::Wifi.allows(ConnectionMode::Ap));
        assert!(!InterfaceKind::Ap.allows(ConnectionMode::Station));
    }

    #[test]
    fn link_state_parses_nmcli_states() {
        assert_eq!(LinkState::parse("connected"), LinkState::Connected);
        assert_eq!(LinkState::parse("connected (externally)"), LinkState::Connected);
        assert_eq!(
            LinkState::parse("connecting (getting IP configuration)"),
            LinkState::Connecting
        );
        assert_eq!(LinkState::parse("unavailable"), LinkState::Unavailable);
        assert_eq!(LinkState::parse(""), LinkState::Unknown);
    }

    #[test]
    fn serializes_flat_wire_shape() {
        let config = AddressConfig::Ethernet(EthernetConfig {
            connection_type: ConnectionMode::StaticIp,
            ipv4: Ipv4Settings {
                ip: Ipv4Addr::new(10, 0, 0, 5),
                mask: Ipv4Addr::new(255, 255, 255, 0),
                route: Ipv4Addr::new(10, 0, 0, 1),
            },
        });
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "ethernet",
                "connection_type": "static_ip",
                "ip": "10.0.0.5",
                "mask": "255.255.255.0",
                "route": "10.0.0.1",
            })
        );
    }

    #[test]
    fn with_mode_respects_kind() {
        let config = AddressConfig::Ap(WirelessConfig {
            connection_type: ConnectionMode::Ap,
            ipv4: Ipv4Settings::unspecified(),
            ssid: "setup".into(),
            passphrase: String::new(),
        });
        let disabled = config.with_mode(ConnectionMode::Disabled).unwrap();
        assert_eq!(disabled.mode(), ConnectionMode::Disabled);
        assert_eq!(disabled.wireless().unwrap().ssid, "setup");
        assert!(config.with_mode(ConnectionMode::StaticIp).is_none());
    }
}
