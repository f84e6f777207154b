//! Configuration authority.
//!
//! # Responsibilities
//! - Own the interface registry for the life of the process
//! - Enforce the visibility policy on every caller-facing read model
//! - Validate multi-interface write requests and commit them all or nothing
//! - Hand each accepted change set to the network backend
//!
//! # Concurrency
//! ```text
//! readers  ──read lock──▶ registry           (concurrent with each other)
//! writers  ──apply order──▶ write lock ──▶ validate → commit ──▶ release
//!                       └──────────────────────────────▶ backend.apply()
//! ```
//! The registry lock is never held across the backend call. The apply-order
//! lock keeps backend calls in commit order.

pub mod changes;
pub mod error;
pub mod visibility;

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::backend::{NetworkApplier, StatusObservation};
use crate::interfaces::{
    parse_config, AddressConfig, ConfigSnapshot, InterfaceKind, InterfaceRegistry, StatusSnapshot,
};
use crate::observability::metrics;

pub use changes::{ApplyRequest, Change, ChangeSet};
pub use error::{AuthorityError, IssueKind, Result, ValidationIssue};
pub use visibility::Visibility;

/// Holds the canonical interface state and arbitrates every access to it.
pub struct ConfigAuthority {
    registry: RwLock<InterfaceRegistry>,
    visibility: ArcSwap<Visibility>,
    applier: Arc<dyn NetworkApplier>,
    apply_order: Mutex<()>,
}

impl ConfigAuthority {
    pub fn new(
        registry: InterfaceRegistry,
        visibility: Visibility,
        applier: Arc<dyn NetworkApplier>,
    ) -> Self {
        Self {
            registry: RwLock::new(registry),
            visibility: ArcSwap::from_pointee(visibility),
            applier,
            apply_order: Mutex::new(()),
        }
    }

    /// Current visibility policy.
    pub fn visibility(&self) -> Arc<Visibility> {
        self.visibility.load_full()
    }

    /// Replace the visibility policy, e.g. after a configuration reload.
    pub fn set_visibility(&self, visibility: Visibility) {
        if *self.visibility.load_full() != visibility {
            tracing::info!(hidden = ?visibility.hidden_device(), "Visibility policy updated");
        }
        self.visibility.store(Arc::new(visibility));
    }

    /// Runtime status of every interface. Not filtered: status is
    /// operational telemetry.
    pub fn status(&self) -> StatusSnapshot {
        self.read().status()
    }

    /// Configuration of every visible interface.
    pub fn config(&self) -> ConfigSnapshot {
        let visibility = self.visibility.load();
        let mut snapshot = self.read().snapshot();
        if let Some(hidden) = visibility.hidden_device() {
            snapshot.shift_remove(hidden);
        }
        snapshot
    }

    /// Configuration of one visible interface.
    pub fn interface_config(&self, device: &str) -> Result<AddressConfig> {
        if self.visibility.load().is_hidden(device) {
            return Err(AuthorityError::NotFound {
                device: device.to_string(),
            });
        }
        Ok(self.read().get(device)?.config.clone())
    }

    /// Names of every visible interface, in enumeration order.
    pub fn interface_names(&self) -> Vec<String> {
        let visibility = self.visibility.load();
        self.read()
            .list()
            .filter(|interface| visibility.is_visible(&interface.device))
            .map(|interface| interface.device.clone())
            .collect()
    }

    /// Kind of an interface, regardless of visibility. For internal callers.
    pub fn kind_of(&self, device: &str) -> Result<InterfaceKind> {
        Ok(self.read().get(device)?.kind)
    }

    /// Configuration of an interface, regardless of visibility. For internal
    /// callers.
    pub fn current_config(&self, device: &str) -> Result<AddressConfig> {
        Ok(self.read().get(device)?.config.clone())
    }

    /// Validate every entry of `request` and commit them together.
    ///
    /// Any unknown (or hidden) device or malformed payload rejects the whole
    /// request and leaves the registry untouched. Does not touch the host;
    /// see [`ConfigAuthority::submit`].
    pub fn apply_config(&self, request: &ApplyRequest) -> Result<ChangeSet> {
        let visibility = self.visibility.load();
        let mut registry = self.write();

        let mut issues = Vec::new();
        let mut validated = Vec::with_capacity(request.len());
        for (device, payload) in request.entries() {
            if visibility.is_hidden(device) || !registry.contains(device) {
                issues.push(ValidationIssue::unknown_interface(device));
                continue;
            }
            let kind = registry.get(device)?.kind;
            match parse_config(kind, payload) {
                Ok(config) => validated.push((device.to_string(), config)),
                Err(e) => issues.push(ValidationIssue::invalid_shape(device, e.to_string())),
            }
        }

        if !issues.is_empty() {
            tracing::warn!(
                rejected = issues.len(),
                entries = request.len(),
                "Configuration request rejected"
            );
            metrics::record_apply("rejected");
            return Err(AuthorityError::ValidationFailed { issues });
        }

        let changes = commit(&mut registry, validated)?;
        metrics::record_apply("committed");
        Ok(changes)
    }

    /// Validate and commit the configuration of a single interface.
    pub fn apply_interface_config(&self, device: &str, payload: &Value) -> Result<ChangeSet> {
        let visibility = self.visibility.load();
        let mut registry = self.write();

        if visibility.is_hidden(device) || !registry.contains(device) {
            metrics::record_apply("rejected");
            return Err(AuthorityError::UnknownInterface {
                device: device.to_string(),
            });
        }
        let kind = registry.get(device)?.kind;
        let config = parse_config(kind, payload).map_err(|e| {
            metrics::record_apply("rejected");
            AuthorityError::InvalidConfigShape {
                device: device.to_string(),
                reason: e.to_string(),
            }
        })?;

        let changes = commit(&mut registry, vec![(device.to_string(), config)])?;
        metrics::record_apply("committed");
        Ok(changes)
    }

    /// [`apply_config`](Self::apply_config), then push the change set to the
    /// backend once the registry lock is released.
    pub fn submit(&self, request: &ApplyRequest) -> Result<ChangeSet> {
        let _order = self.apply_order.lock().unwrap_or_else(PoisonError::into_inner);
        let changes = self.apply_config(request)?;
        self.push(&changes)?;
        Ok(changes)
    }

    /// [`apply_interface_config`](Self::apply_interface_config), then push.
    pub fn submit_interface(&self, device: &str, payload: &Value) -> Result<ChangeSet> {
        let _order = self.apply_order.lock().unwrap_or_else(PoisonError::into_inner);
        let changes = self.apply_interface_config(device, payload)?;
        self.push(&changes)?;
        Ok(changes)
    }

    /// Commit and push an already typed configuration, bypassing the
    /// visibility policy. Used by the hotspot fallback to drive the AP
    /// interface.
    pub fn enforce(&self, device: &str, config: AddressConfig) -> Result<ChangeSet> {
        let _order = self.apply_order.lock().unwrap_or_else(PoisonError::into_inner);
        let changes = {
            let mut registry = self.write();
            commit(&mut registry, vec![(device.to_string(), config)])?
        };
        self.push(&changes)?;
        Ok(changes)
    }

    /// Ingest a status probe. Observations for devices the registry does not
    /// know are ignored.
    pub fn refresh_status(&self, observations: &[StatusObservation]) {
        let mut registry = self.write();
        for observation in observations {
            if registry
                .update_status(&observation.device, observation.link, observation.ipv4)
                .is_err()
            {
                tracing::trace!(device = %observation.device, "Ignoring status of unmanaged device");
            }
        }
    }

    /// Whether any Wi-Fi or Ethernet interface other than `ap_device`
    /// currently has a connected link.
    pub fn has_uplink(&self, ap_device: &str) -> bool {
        self.read().list().any(|interface| {
            interface.kind != InterfaceKind::Ap
                && interface.device != ap_device
                && interface.status.status.is_connected()
        })
    }

    fn push(&self, changes: &ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        match self.applier.apply(changes) {
            Ok(()) => {
                self.annotate(changes, "Configured", false);
                metrics::record_apply("applied");
                tracing::info!(devices = ?changes.devices().collect::<Vec<_>>(), "Configuration applied");
                Ok(())
            }
            Err(e) => {
                self.annotate(changes, &format!("Apply failed: {}", e), true);
                metrics::record_apply("apply_failed");
                tracing::error!(error = %e, "Configuration stored but not applied");
                Err(AuthorityError::Apply(e))
            }
        }
    }

    fn annotate(&self, changes: &ChangeSet, message: &str, error: bool) {
        let mut registry = self.write();
        for device in changes.devices() {
            // Devices in a committed change set always exist.
            let _ = registry.set_status_message(device, message, error);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, InterfaceRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InterfaceRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn commit(
    registry: &mut InterfaceRegistry,
    validated: Vec<(String, AddressConfig)>,
) -> Result<ChangeSet> {
    let replaced = registry.set_configs(validated)?;
    let changes = replaced
        .into_iter()
        .map(|(device, previous, config)| {
            tracing::info!(
                device = %device,
                mode = %config.mode(),
                previous_mode = %previous.mode(),
                "Configuration committed"
            );
            let _ = registry.set_status_message(&device, "Update pending", false);
            Change {
                device,
                previous,
                config,
            }
        })
        .collect();
    Ok(ChangeSet::new(changes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::interfaces::{
        ConnectionMode, EthernetConfig, Interface, Ipv4Settings, LinkState, WirelessConfig,
    };
    use serde_json::json;
    use std::net::Ipv4Addr;

    #[derive(Default)]
    struct RecordingApplier {
        calls: Mutex<Vec<ChangeSet>>,
        fail: bool,
    }

    impl NetworkApplier for RecordingApplier {
        fn apply(&self, changes: &ChangeSet) -> std::result::Result<(), BackendError> {
            self.calls.lock().unwrap().push(changes.clone());
            if self.fail {
                return Err(BackendError::Command {
                    command: "nmcli connection up".into(),
                    code: Some(4),
                    stderr: "activation failed".into(),
                });
            }
            Ok(())
        }
    }

    fn static_eth(ip: &str) -> Value {
        json!({
            "connection_type": "static_ip",
            "ip": ip,
            "mask": "255.255.255.0",
            "route": "10.0.0.1",
        })
    }

    fn interfaces() -> Vec<Interface> {
        let eth = |mode| {
            AddressConfig::Ethernet(EthernetConfig {
                connection_type: mode,
                ipv4: Ipv4Settings::unspecified(),
            })
        };
        vec![
            Interface::new("eth0", eth(ConnectionMode::DynamicIp)),
            Interface::new("eth1", eth(ConnectionMode::Disabled)),
            Interface::new(
                "wlan_ap",
                AddressConfig::Ap(WirelessConfig {
                    connection_type: ConnectionMode::Ap,
                    ipv4: Ipv4Settings {
                        ip: Ipv4Addr::new(192, 168, 4, 1),
                        mask: Ipv4Addr::new(255, 255, 255, 0),
                        route: Ipv4Addr::new(192, 168, 4, 1),
                    },
                    ssid: "setup".into(),
                    passphrase: String::new(),
                }),
            ),
        ]
    }

    fn authority(visibility: Visibility) -> (ConfigAuthority, Arc<RecordingApplier>) {
        let applier = Arc::new(RecordingApplier::default());
        let registry = InterfaceRegistry::new(interfaces()).unwrap();
        (ConfigAuthority::new(registry, visibility, applier.clone()), applier)
    }

    #[test]
    fn write_then_read() {
        let (authority, _) = authority(Visibility::all_visible());
        let request = ApplyRequest::new().with_entry("eth0", static_eth("10.0.0.5"));
        authority.apply_config(&request).unwrap();

        let config = authority.config();
        assert_eq!(config["eth0"].mode(), ConnectionMode::StaticIp);
        assert_eq!(config["eth0"].ipv4().ip, Ipv4Addr::new(10, 0, 0, 5));
    }

    #[test]
    fn unknown_device_rejects_whole_request() {
        let (authority, applier) = authority(Visibility::all_visible());
        let before = authority.current_config("eth0").unwrap();

        let request = ApplyRequest::new()
            .with_entry("eth0", static_eth("10.0.0.5"))
            .with_entry("eth7", json!({}));
        let err = authority.submit(&request).unwrap_err();

        match err {
            AuthorityError::ValidationFailed { issues } => {
                assert_eq!(issues, vec![ValidationIssue::unknown_interface("eth7")]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(authority.current_config("eth0").unwrap(), before);
        assert!(applier.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn collects_every_issue() {
        let (authority, _) = authority(Visibility::all_visible());
        let request = ApplyRequest::new()
            .with_entry("eth0", json!({"connection_type": "station"}))
            .with_entry("eth1", static_eth("10.0.0.6"))
            .with_entry("ghost", json!({}));
        let err = authority.apply_config(&request).unwrap_err();
        let issues = err.issues();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].device, "eth0");
        assert_eq!(issues[0].kind, IssueKind::InvalidConfigShape);
        assert_eq!(issues[1].kind, IssueKind::UnknownInterface);
        assert_eq!(authority.current_config("eth1").unwrap().mode(), ConnectionMode::Disabled);
    }

    #[test]
    fn hidden_device_is_absent_everywhere() {
        let (authority, _) = authority(Visibility::hiding("wlan_ap"));

        assert!(!authority.config().contains_key("wlan_ap"));
        assert_eq!(authority.interface_names(), ["eth0", "eth1"]);
        assert!(matches!(
            authority.interface_config("wlan_ap"),
            Err(AuthorityError::NotFound { .. })
        ));
        // Status stays unfiltered.
        assert!(authority.status().contains_key("wlan_ap"));
    }

    #[test]
    fn hidden_device_is_not_writable() {
        let (authority, _) = authority(Visibility::hiding("wlan_ap"));
        let payload = json!({
            "connection_type": "disabled", "ip": "", "mask": "", "route": "",
            "ssid": "", "passphrase": "",
        });
        assert!(matches!(
            authority.apply_interface_config("wlan_ap", &payload),
            Err(AuthorityError::UnknownInterface { .. })
        ));
        assert_eq!(authority.current_config("wlan_ap").unwrap().mode(), ConnectionMode::Ap);
    }

    #[test]
    fn visibility_can_change_at_runtime() {
        let (authority, _) = authority(Visibility::all_visible());
        assert!(authority.config().contains_key("wlan_ap"));
        authority.set_visibility(Visibility::hiding("wlan_ap"));
        assert!(!authority.config().contains_key("wlan_ap"));
    }

    #[test]
    fn visibility_ignores_registration_order() {
        let applier: Arc<dyn NetworkApplier> = Arc::new(RecordingApplier::default());
        let mut reversed = interfaces();
        reversed.reverse();
        let a = ConfigAuthority::new(
            InterfaceRegistry::new(interfaces()).unwrap(),
            Visibility::hiding("wlan_ap"),
            applier.clone(),
        );
        let b = ConfigAuthority::new(
            InterfaceRegistry::new(reversed).unwrap(),
            Visibility::hiding("wlan_ap"),
            applier,
        );
        let mut left = a.interface_names();
        let mut right = b.interface_names();
        left.sort();
        right.sort();
        assert_eq!(left, right);
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let (authority, _) = authority(Visibility::all_visible());
        let request = ApplyRequest::new().with_entry("eth1", static_eth("10.0.0.9"));
        authority.submit(&request).unwrap();
        let once = authority.config();
        let changes = authority.submit(&request).unwrap();
        assert_eq!(authority.config(), once);
        assert!(changes.iter().all(Change::is_unchanged));
    }

    #[test]
    fn submit_pushes_full_change_set_once() {
        let (authority, applier) = authority(Visibility::all_visible());
        let request = ApplyRequest::new()
            .with_entry("eth0", static_eth("10.0.0.5"))
            .with_entry("eth1", static_eth("10.0.0.6"));
        authority.submit(&request).unwrap();

        let calls = applier.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].devices().collect::<Vec<_>>(), ["eth0", "eth1"]);
        assert_eq!(authority.status()["eth0"].message, "Configured");
    }

    #[test]
    fn empty_request_is_a_no_op() {
        let (authority, applier) = authority(Visibility::all_visible());
        let changes = authority.submit(&ApplyRequest::new()).unwrap();
        assert!(changes.is_empty());
        assert!(applier.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn apply_failure_keeps_intended_state() {
        let applier = Arc::new(RecordingApplier {
            fail: true,
            ..Default::default()
        });
        let authority = ConfigAuthority::new(
            InterfaceRegistry::new(interfaces()).unwrap(),
            Visibility::all_visible(),
            applier,
        );
        let err = authority
            .submit_interface("eth1", &static_eth("10.0.0.6"))
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Apply(_)));
        assert_eq!(authority.current_config("eth1").unwrap().mode(), ConnectionMode::StaticIp);
        let status = &authority.status()["eth1"];
        assert!(status.error);
        assert!(status.message.starts_with("Apply failed"));
    }

    #[test]
    fn concurrent_disjoint_writes_both_land() {
        let (authority, _) = authority(Visibility::all_visible());
        let authority = Arc::new(authority);

        let handles: Vec<_> = [("eth0", "10.0.0.5"), ("eth1", "10.0.0.6")]
            .into_iter()
            .map(|(device, ip)| {
                let authority = authority.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let request = ApplyRequest::new().with_entry(device, static_eth(ip));
                        authority.submit(&request).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let config = authority.config();
        assert_eq!(config["eth0"].ipv4().ip, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(config["eth1"].ipv4().ip, Ipv4Addr::new(10, 0, 0, 6));
    }

    #[test]
    fn refresh_status_and_uplink() {
        let (authority, _) = authority(Visibility::all_visible());
        assert!(!authority.has_uplink("wlan_ap"));

        authority.refresh_status(&[
            StatusObservation {
                device: "eth0".into(),
                link: LinkState::Connected,
                ipv4: Some(Ipv4Addr::new(10, 0, 0, 5)),
            },
            StatusObservation {
                device: "lo".into(),
                link: LinkState::Connected,
                ipv4: None,
            },
        ]);
        assert!(authority.has_uplink("wlan_ap"));
        assert!(!authority.has_uplink("eth0"));
        assert_eq!(authority.status()["eth0"].ipv4, Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(!authority.status().contains_key("lo"));
    }

    #[test]
    fn enforce_bypasses_visibility() {
        let (authority, applier) = authority(Visibility::hiding("wlan_ap"));
        let disabled = authority
            .current_config("wlan_ap")
            .unwrap()
            .with_mode(ConnectionMode::Disabled)
            .unwrap();
        authority.enforce("wlan_ap", disabled).unwrap();
        assert_eq!(
            authority.current_config("wlan_ap").unwrap().mode(),
            ConnectionMode::Disabled
        );
        assert_eq!(applier.calls.lock().unwrap().len(), 1);
    }
}
