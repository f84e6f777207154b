//! Periodic status refresh.
//!
//! # Data Flow
//! ```text
//! every update_period_secs:
//!     InterfaceSource::probe()          (blocking pool)
//!     → ConfigAuthority::refresh_status
//!     → HotspotFallback::evaluate(uplink?, AP mode)
//!     → ConfigAuthority::enforce(AP)    (when the policy says so)
//! ```

pub mod hotspot;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::authority::ConfigAuthority;
use crate::backend::InterfaceSource;
use crate::config::{ApConfig, InterfaceDefaults};
use crate::interfaces::{AddressConfig, ConnectionMode};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

pub use hotspot::{FallbackAction, HotspotFallback};

pub struct StatusMonitor {
    authority: Arc<ConfigAuthority>,
    source: Arc<dyn InterfaceSource>,
    period: Duration,
    ap_device: Option<String>,
    hotspot_defaults: InterfaceDefaults,
    fallback: HotspotFallback,
}

impl StatusMonitor {
    pub fn new(
        authority: Arc<ConfigAuthority>,
        source: Arc<dyn InterfaceSource>,
        period: Duration,
        ap_device: Option<String>,
        ap: &ApConfig,
    ) -> Self {
        Self {
            authority,
            source,
            period,
            ap_device,
            hotspot_defaults: ap.defaults.clone(),
            fallback: HotspotFallback::new(
                ap.always_on,
                Duration::from_secs(ap.enable_after_disconnected_secs),
                Instant::now(),
            ),
        }
    }

    /// Poll until shutdown.
    pub async fn run(mut self, shutdown: Shutdown) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(period = ?self.period, ap = ?self.ap_device, "Status monitor started");

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = interval.tick() => self.poll_once().await,
            }
        }
        tracing::info!("Status monitor stopped");
    }

    /// One probe and fallback evaluation.
    pub async fn poll_once(&mut self) {
        let source = self.source.clone();
        let observations = match tokio::task::spawn_blocking(move || source.probe()).await {
            Ok(Ok(observations)) => observations,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Status probe failed");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Status probe panicked");
                return;
            }
        };

        self.authority.refresh_status(&observations);
        let connected = self
            .authority
            .status()
            .values()
            .filter(|status| status.status.is_connected())
            .count();
        metrics::record_connected(connected);

        let Some(ap_device) = self.ap_device.clone() else {
            return;
        };
        let Ok(current) = self.authority.current_config(&ap_device) else {
            return;
        };

        let uplink = self.authority.has_uplink(&ap_device);
        match self.fallback.evaluate(uplink, current.mode(), Instant::now()) {
            FallbackAction::None => {}
            FallbackAction::EnableHotspot => {
                tracing::warn!(device = %ap_device, "Detected broken connection, setting up hotspot");
                match self.hotspot_defaults.to_hotspot_config(current.kind()) {
                    Ok(config) => self.enforce(ap_device, config, true).await,
                    Err(e) => tracing::error!(error = %e, "Hotspot defaults unusable"),
                }
            }
            FallbackAction::DisableHotspot => {
                tracing::info!(device = %ap_device, "Uplink restored, disabling hotspot");
                if let Some(config) = current.with_mode(ConnectionMode::Disabled) {
                    self.enforce(ap_device, config, false).await;
                }
            }
        }
    }

    async fn enforce(&self, device: String, config: AddressConfig, hotspot: bool) {
        let authority = self.authority.clone();
        let result =
            tokio::task::spawn_blocking(move || authority.enforce(&device, config)).await;
        match result {
            Ok(Ok(_)) => metrics::record_hotspot(hotspot),
            Ok(Err(e)) => tracing::error!(error = %e, "Failed to switch hotspot"),
            Err(e) => tracing::error!(error = %e, "Hotspot switch panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::Visibility;
    use crate::backend::{DiscoveredDevice, DryRunBackend, NetworkApplier};
    use crate::interfaces::{Interface, InterfaceRegistry, LinkState};

    fn setup(grace_secs: u64) -> (StatusMonitor, Arc<ConfigAuthority>, Arc<DryRunBackend>) {
        let backend = Arc::new(DryRunBackend::new(vec![
            DiscoveredDevice::new("eth0", "ethernet"),
            DiscoveredDevice::new("uap0", "__ap"),
        ]));
        let disabled_eth = InterfaceDefaults::default()
            .to_config(crate::interfaces::InterfaceKind::Ethernet)
            .unwrap();
        let ap_disabled = InterfaceDefaults::hotspot()
            .to_config(crate::interfaces::InterfaceKind::Ap)
            .unwrap()
            .with_mode(ConnectionMode::Disabled)
            .unwrap();
        let interfaces = vec![
            Interface::new("eth0", disabled_eth),
            Interface::new("uap0", ap_disabled),
        ];
        backend.prepare(&interfaces).unwrap();

        let authority = Arc::new(ConfigAuthority::new(
            InterfaceRegistry::new(interfaces).unwrap(),
            Visibility::all_visible(),
            backend.clone(),
        ));
        let ap = ApConfig {
            enable_after_disconnected_secs: grace_secs,
            ..ApConfig::default()
        };
        let monitor = StatusMonitor::new(
            authority.clone(),
            backend.clone(),
            Duration::from_millis(10),
            Some("uap0".into()),
            &ap,
        );
        (monitor, authority, backend)
    }

    #[tokio::test]
    async fn poll_refreshes_status() {
        let (mut monitor, authority, _) = setup(3600);
        monitor.poll_once().await;
        assert_eq!(authority.status()["eth0"].status, LinkState::Disconnected);
    }

    #[tokio::test]
    async fn hotspot_comes_up_without_uplink() {
        let (mut monitor, authority, backend) = setup(0);
        monitor.poll_once().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        monitor.poll_once().await;

        assert_eq!(authority.current_config("uap0").unwrap().mode(), ConnectionMode::Ap);
        assert_eq!(backend.applied("uap0").unwrap().mode(), ConnectionMode::Ap);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (monitor, _, _) = setup(3600);
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(monitor.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
