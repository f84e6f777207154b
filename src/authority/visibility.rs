//! Which interfaces callers may see.

use crate::config::ApConfig;

/// Visibility policy: at most one device, the access-point uplink, is hidden
/// from configuration snapshots and interface listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visibility {
    hidden_device: Option<String>,
}

impl Visibility {
    /// Nothing hidden.
    pub fn all_visible() -> Self {
        Self::default()
    }

    pub fn hiding(device: impl Into<String>) -> Self {
        Self {
            hidden_device: Some(device.into()),
        }
    }

    pub fn from_ap_config(ap: &ApConfig) -> Self {
        if ap.hide_in_ui && !ap.interface_device.is_empty() {
            Self::hiding(ap.interface_device.clone())
        } else {
            Self::all_visible()
        }
    }

    pub fn hidden_device(&self) -> Option<&str> {
        self.hidden_device.as_deref()
    }

    pub fn is_hidden(&self, device: &str) -> bool {
        self.hidden_device.as_deref() == Some(device)
    }

    pub fn is_visible(&self, device: &str) -> bool {
        !self.is_hidden(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_ap_settings() {
        let mut ap = ApConfig::default();
        ap.interface_device = "wlan_ap".into();

        ap.hide_in_ui = false;
        assert!(Visibility::from_ap_config(&ap).is_visible("wlan_ap"));

        ap.hide_in_ui = true;
        let visibility = Visibility::from_ap_config(&ap);
        assert!(visibility.is_hidden("wlan_ap"));
        assert!(visibility.is_visible("eth0"));
    }

    #[test]
    fn empty_device_hides_nothing() {
        let mut ap = ApConfig::default();
        ap.hide_in_ui = true;
        ap.interface_device = String::new();
        assert_eq!(Visibility::from_ap_config(&ap), Visibility::all_visible());
    }
}
