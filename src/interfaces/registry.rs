//! In-memory registry of known interfaces.
//!
//! The registry is populated once from the startup enumeration and keeps
//! insertion order for the rest of its life. It does no locking of its own;
//! the configuration authority serializes access.

use std::net::Ipv4Addr;

use indexmap::IndexMap;

use crate::interfaces::types::{AddressConfig, Interface, InterfaceStatus, LinkState};

/// Device name -> configuration, in registry order.
pub type ConfigSnapshot = IndexMap<String, AddressConfig>;

/// Device name -> status, in registry order.
pub type StatusSnapshot = IndexMap<String, InterfaceStatus>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("interface not found: {device}")]
    NotFound { device: String },

    #[error("invalid configuration for {device}: {reason}")]
    InvalidConfig { device: String, reason: String },

    #[error("duplicate interface: {device}")]
    DuplicateDevice { device: String },
}

#[derive(Debug, Default)]
pub struct InterfaceRegistry {
    interfaces: IndexMap<String, Interface>,
}

impl InterfaceRegistry {
    /// Build a registry from the startup enumeration.
    pub fn new(interfaces: impl IntoIterator<Item = Interface>) -> Result<Self, RegistryError> {
        let mut map = IndexMap::new();
        for interface in interfaces {
            if interface.config.kind() != interface.kind {
                return Err(RegistryError::InvalidConfig {
                    device: interface.device,
                    reason: format!(
                        "{} configuration on {} interface",
                        interface.config.kind(),
                        interface.kind
                    ),
                });
            }
            if map.contains_key(&interface.device) {
                return Err(RegistryError::DuplicateDevice {
                    device: interface.device,
                });
            }
            map.insert(interface.device.clone(), interface);
        }
        Ok(Self { interfaces: map })
    }

    /// All interfaces in enumeration order.
    pub fn list(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.values()
    }

    pub fn get(&self, device: &str) -> Result<&Interface, RegistryError> {
        self.interfaces.get(device).ok_or_else(|| not_found(device))
    }

    pub fn contains(&self, device: &str) -> bool {
        self.interfaces.contains_key(device)
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Replace the configuration of one interface.
    ///
    /// Returns the configuration that was replaced.
    pub fn set_config(
        &mut self,
        device: &str,
        config: AddressConfig,
    ) -> Result<AddressConfig, RegistryError> {
        self.check_config(device, &config)?;
        let interface = self.interfaces.get_mut(device).ok_or_else(|| not_found(device))?;
        Ok(std::mem::replace(&mut interface.config, config))
    }

    /// Replace several configurations at once. Either every entry is accepted
    /// or the registry is left untouched.
    pub fn set_configs(
        &mut self,
        configs: Vec<(String, AddressConfig)>,
    ) -> Result<Vec<(String, AddressConfig, AddressConfig)>, RegistryError> {
        for (device, config) in &configs {
            self.check_config(device, config)?;
        }
        let mut replaced = Vec::with_capacity(configs.len());
        for (device, config) in configs {
            let previous = self.set_config(&device, config.clone())?;
            replaced.push((device, previous, config));
        }
        Ok(replaced)
    }

    /// Check that `config` fits the interface without storing it.
    pub fn check_config(&self, device: &str, config: &AddressConfig) -> Result<(), RegistryError> {
        let interface = self.get(device)?;
        if config.kind() != interface.kind {
            return Err(RegistryError::InvalidConfig {
                device: device.to_string(),
                reason: format!(
                    "{} configuration does not fit {} interface",
                    config.kind(),
                    interface.kind
                ),
            });
        }
        if !interface.kind.allows(config.mode()) {
            return Err(RegistryError::InvalidConfig {
                device: device.to_string(),
                reason: format!("connection type `{}` not allowed", config.mode()),
            });
        }
        Ok(())
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        self.interfaces
            .iter()
            .map(|(device, interface)| (device.clone(), interface.config.clone()))
            .collect()
    }

    /// Runtime status of every interface. Never probes the host.
    pub fn status(&self) -> StatusSnapshot {
        self.interfaces
            .iter()
            .map(|(device, interface)| (device.clone(), interface.status.clone()))
            .collect()
    }

    /// Record an observed link state.
    pub fn update_status(
        &mut self,
        device: &str,
        link: LinkState,
        ipv4: Option<Ipv4Addr>,
    ) -> Result<(), RegistryError> {
        let interface = self.interfaces.get_mut(device).ok_or_else(|| not_found(device))?;
        interface.status.status = link;
        interface.status.ipv4 = ipv4;
        Ok(())
    }

    pub fn set_status_message(
        &mut self,
        device: &str,
        message: impl Into<String>,
        error: bool,
    ) -> Result<(), RegistryError> {
        let interface = self.interfaces.get_mut(device).ok_or_else(|| not_found(device))?;
        interface.status.message = message.into();
        interface.status.error = error;
        Ok(())
    }
}

fn not_found(device: &str) -> RegistryError {
    RegistryError::NotFound {
        device: device.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::types::{ConnectionMode, EthernetConfig, Ipv4Settings, WirelessConfig};

    fn eth(mode: ConnectionMode) -> AddressConfig {
        AddressConfig::Ethernet(EthernetConfig {
            connection_type: mode,
            ipv4: Ipv4Settings::unspecified(),
        })
    }

    fn ap() -> AddressConfig {
        AddressConfig::Ap(WirelessConfig {
            connection_type: ConnectionMode::Ap,
            ipv4: Ipv4Settings {
                ip: Ipv4Addr::new(192, 168, 4, 1),
                mask: Ipv4Addr::new(255, 255, 255, 0),
                route: Ipv4Addr::new(192, 168, 4, 1),
            },
            ssid: "setup".into(),
            passphrase: String::new(),
        })
    }

    fn registry() -> InterfaceRegistry {
        InterfaceRegistry::new(vec![
            Interface::new("eth1", eth(ConnectionMode::DynamicIp)),
            Interface::new("eth0", eth(ConnectionMode::Disabled)),
            Interface::new("uap0", ap()),
        ])
        .unwrap()
    }

    #[test]
    fn list_keeps_insertion_order() {
        let names: Vec<_> = registry().list().map(|i| i.device.clone()).collect();
        assert_eq!(names, ["eth1", "eth0", "uap0"]);
    }

    #[test]
    fn rejects_duplicates() {
        let err = InterfaceRegistry::new(vec![
            Interface::new("eth0", eth(ConnectionMode::Disabled)),
            Interface::new("eth0", eth(ConnectionMode::DynamicIp)),
        ])
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateDevice { device: "eth0".into() });
    }

    #[test]
    fn get_unknown_is_not_found() {
        assert_eq!(
            registry().get("wlan9").unwrap_err(),
            RegistryError::NotFound { device: "wlan9".into() }
        );
    }

    #[test]
    fn set_config_replaces_and_returns_previous() {
        let mut registry = registry();
        let previous = registry.set_config("eth0", eth(ConnectionMode::DynamicIp)).unwrap();
        assert_eq!(previous.mode(), ConnectionMode::Disabled);
        assert_eq!(registry.get("eth0").unwrap().mode(), ConnectionMode::DynamicIp);
    }

    #[test]
    fn set_config_rejects_wrong_kind() {
        let mut registry = registry();
        let err = registry.set_config("eth0", ap()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig { ref device, .. } if device == "eth0"));
        assert_eq!(registry.get("eth0").unwrap().mode(), ConnectionMode::Disabled);
    }

    #[test]
    fn set_configs_is_all_or_nothing() {
        let mut registry = registry();
        let err = registry
            .set_configs(vec![
                ("eth0".into(), eth(ConnectionMode::DynamicIp)),
                ("uap0".into(), eth(ConnectionMode::DynamicIp)),
            ])
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig { .. }));
        assert_eq!(registry.get("eth0").unwrap().mode(), ConnectionMode::Disabled);
    }

    #[test]
    fn status_updates_are_reported() {
        let mut registry = registry();
        registry
            .update_status("eth1", LinkState::Connected, Some(Ipv4Addr::new(10, 1, 1, 2)))
            .unwrap();
        registry.set_status_message("eth1", "Configured", false).unwrap();

        let status = registry.status();
        assert_eq!(status["eth1"].status, LinkState::Connected);
        assert_eq!(status["eth1"].message, "Configured");
        assert_eq!(status["eth0"].status, LinkState::Unknown);
        assert!(registry.update_status("nope", LinkState::Connected, None).is_err());
    }
}
