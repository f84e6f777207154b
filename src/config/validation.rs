//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that interface defaults are valid payloads for their kind
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Runs before a configuration is accepted, at startup and on reload

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{InterfaceDefaults, ServiceConfig};
use crate::interfaces::InterfaceKind;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Characters the router reads as path parameters or wildcards.
const ROUTE_METACHARACTERS: [char; 3] = ['{', '}', '*'];

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.server.socket_addr() {
        errors.push(ValidationError::new(
            "server.address",
            format!("`{}` is not an IP address: {}", config.server.address, e),
        ));
    }
    if config.server.port == 0 {
        errors.push(ValidationError::new("server.port", "must be non-zero"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be positive"));
    }
    if config.server.max_body_bytes == 0 {
        errors.push(ValidationError::new("server.max_body_bytes", "must be positive"));
    }
    if config.server.reverse_proxy_path.contains(char::is_whitespace) {
        errors.push(ValidationError::new(
            "server.reverse_proxy_path",
            "must not contain whitespace",
        ));
    }
    if config.server.reverse_proxy_path.contains(ROUTE_METACHARACTERS) {
        errors.push(ValidationError::new(
            "server.reverse_proxy_path",
            "must not contain `{`, `}` or `*`",
        ));
    }

    if config.interfaces.update_period_secs == 0 {
        errors.push(ValidationError::new("interfaces.update_period_secs", "must be positive"));
    }
    if config.interfaces.use_whitelist && config.interfaces.whitelist.is_empty() {
        errors.push(ValidationError::new(
            "interfaces.whitelist",
            "whitelist enabled but empty",
        ));
    }

    if (config.ap.use_dedicated_ap || config.ap.hide_in_ui)
        && config.ap.interface_device.is_empty()
    {
        errors.push(ValidationError::new("ap.interface_device", "must be set"));
    }

    check_defaults(&mut errors, "ethernet", &config.ethernet, InterfaceKind::Ethernet);
    check_defaults(&mut errors, "wifi", &config.wifi, InterfaceKind::Wifi);
    check_defaults(&mut errors, "ap.defaults", &config.ap.defaults, InterfaceKind::Ap);
    if let Err(e) = config.ap.defaults.to_hotspot_config(InterfaceKind::Ap) {
        errors.push(ValidationError::new("ap.defaults", format!("unusable for hotspot: {}", e)));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_defaults(
    errors: &mut Vec<ValidationError>,
    field: &str,
    defaults: &InterfaceDefaults,
    kind: InterfaceKind,
) {
    if let Err(e) = defaults.to_config(kind) {
        errors.push(ValidationError::new(field, e.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ServiceConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ServiceConfig::default();
        config.server.address = "localhost".into();
        config.server.request_timeout_secs = 0;
        config.ethernet.connection_type = "station".into();
        config.interfaces.use_whitelist = true;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            [
                "server.address",
                "server.request_timeout_secs",
                "interfaces.whitelist",
                "ethernet"
            ]
        );
    }

    #[test]
    fn hotspot_defaults_need_an_address() {
        let mut config = ServiceConfig::default();
        config.ap.defaults.ip = String::new();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().all(|e| e.field == "ap.defaults"));
    }

    #[test]
    fn prefix_rejects_route_metacharacters() {
        for prefix in ["/net{conf", "/netconf}", "/net/*rest", "/{id}"] {
            let mut config = ServiceConfig::default();
            config.server.reverse_proxy_path = prefix.into();
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors.len(), 1, "{prefix}");
            assert_eq!(errors[0].field, "server.reverse_proxy_path");
        }

        let mut config = ServiceConfig::default();
        config.server.reverse_proxy_path = "/net-conf/v1/".into();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
