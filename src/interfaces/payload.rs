//! Conversion of untyped wire payloads into [`AddressConfig`].
//!
//! A payload is a JSON object. Which keys are required depends on the
//! interface kind; keys that are not part of the kind's shape are rejected
//! rather than ignored. The optional `type` key must name the kind of the
//! interface being written.

use std::net::Ipv4Addr;

use serde_json::{Map, Value};

use crate::interfaces::types::{
    netmask_prefix, AddressConfig, ConnectionMode, EthernetConfig, InterfaceKind, Ipv4Settings,
    WirelessConfig,
};

const TYPE_KEY: &str = "type";
const ETHERNET_KEYS: &[&str] = &["connection_type", "ip", "mask", "route"];
const WIRELESS_KEYS: &[&str] = &["connection_type", "ip", "mask", "route", "ssid", "passphrase"];

/// Shortest and longest WPA2 passphrase accepted for a hotspot, in bytes.
const PASSPHRASE_LEN: std::ops::RangeInclusive<usize> = 8..=63;

/// Reason a payload does not match the shape required by an interface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("unknown parameter `{0}`")]
    UnknownKey(String),

    #[error("missing parameter `{0}`")]
    MissingKey(&'static str),

    #[error("parameter `{0}` must be a string")]
    NotAString(&'static str),

    #[error("type `{found}` does not match interface type `{expected}`")]
    KindMismatch {
        expected: InterfaceKind,
        found: String,
    },

    #[error("invalid connection type `{value}`, available types are: {available}")]
    InvalidMode { value: String, available: String },

    #[error("parameter `{key}` is not a valid IPv4 address: `{value}`")]
    InvalidAddress { key: &'static str, value: String },

    #[error("mask `{0}` is not a contiguous non-zero netmask")]
    InvalidMask(Ipv4Addr),

    #[error("connection type `{0}` requires a non-zero ip")]
    MissingAddress(ConnectionMode),

    #[error("connection type `{0}` requires a non-empty ssid")]
    EmptySsid(ConnectionMode),

    #[error("access point passphrase must be empty or 8 to 63 printable ASCII characters")]
    InvalidPassphrase,
}

/// Name of a JSON value's type, for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validate `payload` against the shape required by `kind`.
pub fn parse_config(kind: InterfaceKind, payload: &Value) -> Result<AddressConfig, PayloadError> {
    let object = payload
        .as_object()
        .ok_or_else(|| PayloadError::NotAnObject(json_type_name(payload)))?;

    let keys = if kind.is_wireless() { WIRELESS_KEYS } else { ETHERNET_KEYS };

    if let Some(unknown) = object
        .keys()
        .find(|key| key.as_str() != TYPE_KEY && !keys.contains(&key.as_str()))
    {
        return Err(PayloadError::UnknownKey(unknown.clone()));
    }

    if let Some(declared) = object.get(TYPE_KEY) {
        let declared = declared.as_str().ok_or(PayloadError::NotAString(TYPE_KEY))?;
        if declared != kind.as_str() {
            return Err(PayloadError::KindMismatch {
                expected: kind,
                found: declared.to_string(),
            });
        }
    }

    let mode_name = string_field(object, "connection_type")?;
    let mode = mode_name
        .parse::<ConnectionMode>()
        .ok()
        .filter(|mode| kind.allows(*mode))
        .ok_or_else(|| PayloadError::InvalidMode {
            value: mode_name.to_string(),
            available: kind
                .allowed_modes()
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    let ipv4 = parse_ipv4(object, mode)?;

    if !kind.is_wireless() {
        return Ok(AddressConfig::Ethernet(EthernetConfig {
            connection_type: mode,
            ipv4,
        }));
    }

    let ssid = string_field(object, "ssid")?.to_string();
    let passphrase = string_field(object, "passphrase")?.to_string();

    if mode.requires_ssid() && ssid.trim().is_empty() {
        return Err(PayloadError::EmptySsid(mode));
    }
    if mode == ConnectionMode::Ap
        && !passphrase.is_empty()
        && !valid_passphrase(&passphrase)
    {
        return Err(PayloadError::InvalidPassphrase);
    }

    let wireless = WirelessConfig {
        connection_type: mode,
        ipv4,
        ssid,
        passphrase,
    };
    Ok(match kind {
        InterfaceKind::Ap => AddressConfig::Ap(wireless),
        _ => AddressConfig::Wifi(wireless),
    })
}

/// WPA-PSK passphrases are printable ASCII.
fn valid_passphrase(passphrase: &str) -> bool {
    PASSPHRASE_LEN.contains(&passphrase.len())
        && passphrase.bytes().all(|b| (0x20..=0x7e).contains(&b))
}

fn string_field<'a>(
    object: &'a Map<String, Value>,
    key: &'static str,
) -> Result<&'a str, PayloadError> {
    object
        .get(key)
        .ok_or(PayloadError::MissingKey(key))?
        .as_str()
        .ok_or(PayloadError::NotAString(key))
}

fn parse_ipv4(
    object: &Map<String, Value>,
    mode: ConnectionMode,
) -> Result<Ipv4Settings, PayloadError> {
    let ip = address_field(object, "ip", mode)?;
    let mask = address_field(object, "mask", mode)?;
    let route = address_field(object, "route", mode)?;

    if mode.carries_address() {
        if ip.is_unspecified() {
            return Err(PayloadError::MissingAddress(mode));
        }
        if matches!(netmask_prefix(mask), None | Some(0)) {
            return Err(PayloadError::InvalidMask(mask));
        }
    }

    Ok(Ipv4Settings { ip, mask, route })
}

/// Modes that do not assign an address accept an empty string, stored as
/// `0.0.0.0`.
fn address_field(
    object: &Map<String, Value>,
    key: &'static str,
    mode: ConnectionMode,
) -> Result<Ipv4Addr, PayloadError> {
    let raw = string_field(object, key)?.trim();
    if raw.is_empty() && !mode.carries_address() {
        return Ok(Ipv4Addr::UNSPECIFIED);
    }
    raw.parse().map_err(|_| PayloadError::InvalidAddress {
        key,
        value: raw.to_string(),
    })
}
