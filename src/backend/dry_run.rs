//! Backend that touches nothing on the host.
//!
//! Devices come from the configured inventory; applied configuration is only
//! remembered and logged. Link state is derived from the last applied mode,
//! which makes the whole service usable on a development machine.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Mutex, PoisonError};

use crate::authority::ChangeSet;
use crate::interfaces::{AddressConfig, ConnectionMode, Interface, InterfaceKind, LinkState};

use super::{BackendError, DiscoveredDevice, InterfaceSource, NetworkApplier, StatusObservation};

#[derive(Debug, Default)]
pub struct DryRunBackend {
    inventory: Vec<DiscoveredDevice>,
    applied: Mutex<HashMap<String, AddressConfig>>,
}

impl DryRunBackend {
    pub fn new(inventory: Vec<DiscoveredDevice>) -> Self {
        Self {
            inventory,
            applied: Mutex::new(HashMap::new()),
        }
    }

    /// Last configuration applied to `device`, if any.
    pub fn applied(&self, device: &str) -> Option<AddressConfig> {
        self.lock().get(device).cloned()
    }

    /// Pretend the link of `device` changed mode, e.g. a cable was pulled.
    pub fn force(&self, device: &str, config: AddressConfig) {
        self.lock().insert(device.to_string(), config);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, AddressConfig>> {
        self.applied.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InterfaceSource for DryRunBackend {
    fn discover(&self) -> Result<Vec<DiscoveredDevice>, BackendError> {
        Ok(self.inventory.clone())
    }

    fn probe(&self) -> Result<Vec<StatusObservation>, BackendError> {
        let applied = self.lock();
        Ok(self
            .inventory
            .iter()
            .map(|device| {
                let (link, ipv4) = match applied.get(&device.device) {
                    Some(config) => observe(config),
                    None => (LinkState::Disconnected, None),
                };
                StatusObservation {
                    device: device.device.clone(),
                    link,
                    ipv4,
                }
            })
            .collect())
    }

    fn current_config(
        &self,
        device: &str,
        kind: InterfaceKind,
    ) -> Result<Option<AddressConfig>, BackendError> {
        Ok(self
            .lock()
            .get(device)
            .filter(|config| config.kind() == kind)
            .cloned())
    }
}

impl NetworkApplier for DryRunBackend {
    fn prepare(&self, interfaces: &[Interface]) -> Result<(), BackendError> {
        let mut applied = self.lock();
        for interface in interfaces {
            applied
                .entry(interface.device.clone())
                .or_insert_with(|| interface.config.clone());
        }
        tracing::info!(interfaces = interfaces.len(), "Dry-run backend ready");
        Ok(())
    }

    fn apply(&self, changes: &ChangeSet) -> Result<(), BackendError> {
        let mut applied = self.lock();
        for change in changes {
            tracing::info!(
                device = %change.device,
                mode = %change.mode(),
                ip = %change.config.ipv4().ip,
                "Dry run: configuration not pushed to host"
            );
            applied.insert(change.device.clone(), change.config.clone());
        }
        Ok(())
    }
}

fn observe(config: &AddressConfig) -> (LinkState, Option<Ipv4Addr>) {
    match config.mode() {
        ConnectionMode::Disabled => (LinkState::Disconnected, None),
        // No DHCP server to ask; report the link without an address.
        ConnectionMode::DynamicIp | ConnectionMode::Station => (LinkState::Connected, None),
        ConnectionMode::StaticIp | ConnectionMode::DhcpServer | ConnectionMode::Ap => {
            (LinkState::Connected, Some(config.ipv4().ip))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::Change;
    use crate::interfaces::{EthernetConfig, Ipv4Settings};

    fn ethernet(mode: ConnectionMode, ip: Ipv4Addr) -> AddressConfig {
        AddressConfig::Ethernet(EthernetConfig {
            connection_type: mode,
            ipv4: Ipv4Settings {
                ip,
                mask: Ipv4Addr::new(255, 255, 255, 0),
                route: Ipv4Addr::UNSPECIFIED,
            },
        })
    }

    #[test]
    fn probe_reflects_applied_mode() {
        let backend = DryRunBackend::new(vec![
            DiscoveredDevice::new("eth0", "ethernet"),
            DiscoveredDevice::new("eth1", "ethernet"),
        ]);
        let disabled = ethernet(ConnectionMode::Disabled, Ipv4Addr::UNSPECIFIED);
        backend
            .prepare(&[Interface::new("eth0", disabled.clone())])
            .unwrap();

        let configured = ethernet(ConnectionMode::StaticIp, Ipv4Addr::new(10, 0, 0, 5));
        backend
            .apply(&ChangeSet::new(vec![Change {
                device: "eth0".into(),
                previous: disabled,
                config: configured.clone(),
            }]))
            .unwrap();

        let observations = backend.probe().unwrap();
        assert_eq!(observations[0].link, LinkState::Connected);
        assert_eq!(observations[0].ipv4, Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(observations[1].link, LinkState::Disconnected);
        assert_eq!(backend.applied("eth0"), Some(configured));
    }

    #[test]
    fn discover_returns_inventory() {
        let inventory = vec![DiscoveredDevice::new("wlan0", "wifi")];
        let backend = DryRunBackend::new(inventory.clone());
        assert_eq!(backend.discover().unwrap(), inventory);
    }
}
