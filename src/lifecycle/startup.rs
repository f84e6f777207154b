//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the configured backend
//! - Enumerate host devices into interfaces (whitelist, AP selection)
//! - Adopt the configuration the host already runs; seed the rest with the
//!   configured defaults
//! - Hand the registry to a new configuration authority
//!
//! # Design Decisions
//! - Fail fast on configuration and enumeration errors
//! - Profile preparation failures are logged; the API still serves reads
//! - Defaults are not pushed to the host at startup; the status monitor
//!   reports what the host actually does

use std::sync::Arc;

use crate::authority::{ConfigAuthority, Visibility};
use crate::backend::{
    BackendError, DiscoveredDevice, DryRunBackend, InterfaceSource, NetworkApplier, NmcliBackend,
};
use crate::config::{BackendKind, ServiceConfig};
use crate::interfaces::{
    AddressConfig, Interface, InterfaceKind, InterfaceRegistry, PayloadError, RegistryError,
};

/// Device type NetworkManager reports for a dedicated AP virtual interface.
pub const AP_DEVICE_TYPE: &str = "__ap";

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("interface enumeration failed: {0}")]
    Backend(#[from] BackendError),

    #[error("invalid {kind} defaults: {source}")]
    Defaults {
        kind: InterfaceKind,
        #[source]
        source: PayloadError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The backend split along the seams the rest of the service uses.
#[derive(Clone)]
pub struct Backend {
    pub source: Arc<dyn InterfaceSource>,
    pub applier: Arc<dyn NetworkApplier>,
}

pub fn build_backend(config: &ServiceConfig) -> Backend {
    match config.interfaces.backend {
        BackendKind::Nmcli => {
            let backend = Arc::new(NmcliBackend::new(
                config.interfaces.use_sudo,
                config.interfaces.connection_wait_secs,
            ));
            Backend {
                source: backend.clone(),
                applier: backend,
            }
        }
        BackendKind::DryRun => {
            let inventory = config
                .interfaces
                .inventory
                .iter()
                .map(|entry| DiscoveredDevice::new(entry.device.clone(), entry.device_type.clone()))
                .collect();
            let backend = Arc::new(DryRunBackend::new(inventory));
            Backend {
                source: backend.clone(),
                applier: backend,
            }
        }
    }
}

/// Result of turning host devices into interfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Discovery {
    pub interfaces: Vec<Interface>,
    /// Interface the hotspot fallback drives, if any.
    pub ap_device: Option<String>,
}

/// Apply the discovery rules to the devices the backend reported.
pub fn discover_interfaces(
    devices: &[DiscoveredDevice],
    config: &ServiceConfig,
) -> Result<Discovery, StartupError> {
    let ethernet = defaults(config, InterfaceKind::Ethernet)?;
    let wifi = defaults(config, InterfaceKind::Wifi)?;

    let mut interfaces = Vec::new();
    let mut dedicated_ap: Option<String> = None;

    for device in devices {
        tracing::info!(device = %device.device, device_type = %device.device_type, "Found device");
        if config.interfaces.use_whitelist
            && !config.interfaces.whitelist.contains(&device.device)
        {
            tracing::info!(device = %device.device, "Skipping device outside whitelist");
            continue;
        }
        if interfaces.iter().any(|i: &Interface| i.device == device.device) {
            tracing::warn!(device = %device.device, "Skipping duplicate device");
            continue;
        }

        match device.device_type.as_str() {
            "ethernet" => interfaces.push(Interface::new(device.device.clone(), ethernet.clone())),
            "wifi" => interfaces.push(Interface::new(device.device.clone(), wifi.clone())),
            AP_DEVICE_TYPE if config.ap.use_dedicated_ap => {
                if let Some(existing) = &dedicated_ap {
                    tracing::warn!(
                        device = %device.device,
                        ap = %existing,
                        "More than one AP device found, skipping"
                    );
                    continue;
                }
                let ap = defaults(config, InterfaceKind::Ap)?;
                interfaces.push(Interface::new(device.device.clone(), ap));
                dedicated_ap = Some(device.device.clone());
            }
            other => {
                tracing::info!(
                    device = %device.device,
                    device_type = %other,
                    "Skipping device of unsupported type"
                );
            }
        }
    }

    let ap_device = if config.ap.use_dedicated_ap {
        match dedicated_ap {
            Some(device) => {
                tracing::info!(device = %device, "Dedicated AP interface found");
                Some(device)
            }
            None => {
                let device = config.ap.interface_device.clone();
                tracing::info!(device = %device, "AP interface not found, registering it");
                let ap = defaults(config, InterfaceKind::Ap)?;
                interfaces.push(Interface::new(device.clone(), ap));
                Some(device)
            }
        }
    } else {
        let first_wifi = interfaces
            .iter()
            .find(|i| i.kind == InterfaceKind::Wifi)
            .map(|i| i.device.clone());
        if let Some(device) = &first_wifi {
            tracing::info!(device = %device, "Dedicated AP not used, Wi-Fi interface doubles as AP");
        }
        first_wifi
    };

    Ok(Discovery {
        interfaces,
        ap_device,
    })
}

fn defaults(
    config: &ServiceConfig,
    kind: InterfaceKind,
) -> Result<AddressConfig, StartupError> {
    let section = match kind {
        InterfaceKind::Ethernet => &config.ethernet,
        InterfaceKind::Wifi => &config.wifi,
        InterfaceKind::Ap => &config.ap.defaults,
    };
    section
        .to_config(kind)
        .map_err(|source| StartupError::Defaults { kind, source })
}

/// Replace defaults with the configuration the host already runs. Interfaces
/// the backend knows nothing about, or cannot read, keep their defaults.
pub fn adopt_host_state(source: &dyn InterfaceSource, interfaces: &mut [Interface]) {
    for interface in interfaces.iter_mut() {
        match source.current_config(&interface.device, interface.kind) {
            Ok(Some(config)) if config.kind() == interface.kind => {
                tracing::info!(
                    device = %interface.device,
                    mode = %config.mode(),
                    "Adopted host configuration"
                );
                interface.config = config;
            }
            Ok(_) => {
                tracing::info!(device = %interface.device, "No host configuration, using defaults");
            }
            Err(e) => {
                tracing::warn!(
                    device = %interface.device,
                    error = %e,
                    "Cannot read host configuration, using defaults"
                );
            }
        }
    }
}

/// Everything the running service needs from startup.
pub struct Bootstrap {
    pub authority: Arc<ConfigAuthority>,
    pub source: Arc<dyn InterfaceSource>,
    pub ap_device: Option<String>,
}

/// Enumerate interfaces and build the authority. Blocking.
pub fn bootstrap(config: &ServiceConfig, backend: Backend) -> Result<Bootstrap, StartupError> {
    let devices = backend.source.discover()?;
    let mut discovery = discover_interfaces(&devices, config)?;
    adopt_host_state(backend.source.as_ref(), &mut discovery.interfaces);

    if let Err(e) = backend.applier.prepare(&discovery.interfaces) {
        tracing::error!(error = %e, "Failed to prepare connection profiles");
    }

    let registry = InterfaceRegistry::new(discovery.interfaces)?;
    tracing::info!(
        interfaces = registry.len(),
        ap = ?discovery.ap_device,
        "Interface registry ready"
    );

    let authority = ConfigAuthority::new(
        registry,
        Visibility::from_ap_config(&config.ap),
        backend.applier,
    );

    Ok(Bootstrap {
        authority: Arc::new(authority),
        source: backend.source,
        ap_device: discovery.ap_device,
    })
}
