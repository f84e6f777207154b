//! Hotspot fallback policy.
//!
//! When no uplink has been connected for longer than the grace period, the
//! AP interface is switched to access-point mode so the device stays
//! reachable for setup. When an uplink comes back the hotspot is switched off
//! again unless it is configured always on.

use std::time::{Duration, Instant};

use crate::interfaces::ConnectionMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackAction {
    None,
    EnableHotspot,
    DisableHotspot,
}

#[derive(Debug, Clone)]
pub struct HotspotFallback {
    always_on: bool,
    grace: Duration,
    previously_connected: bool,
    disconnected_since: Instant,
}

impl HotspotFallback {
    pub fn new(always_on: bool, grace: Duration, now: Instant) -> Self {
        Self {
            always_on,
            grace,
            previously_connected: true,
            disconnected_since: now,
        }
    }

    /// Decide what to do with the AP interface given the current uplink state
    /// and the AP's current mode.
    pub fn evaluate(
        &mut self,
        connected: bool,
        ap_mode: ConnectionMode,
        now: Instant,
    ) -> FallbackAction {
        let mut action = FallbackAction::None;

        if connected != self.previously_connected {
            if connected {
                if !self.always_on && ap_mode != ConnectionMode::Disabled {
                    action = FallbackAction::DisableHotspot;
                }
            } else {
                self.disconnected_since = now;
            }
        }
        self.previously_connected = connected;

        if !connected
            && now.duration_since(self.disconnected_since) > self.grace
            && ap_mode != ConnectionMode::Ap
        {
            action = FallbackAction::EnableHotspot;
        }
        action
    }
}
