//! NetworkManager backend driven through the `nmcli` command line tool.
//!
//! # Data Flow
//! ```text
//! startup  → discover()        nmcli -t -f DEVICE,TYPE device
//!          → current_config()  autoconnect profile → its settings
//!          → prepare()         drop duplicate profiles, create missing ones
//! monitor  → probe()     nmcli -t -f DEVICE,STATE device
//!                        nmcli -t -f IP4.ADDRESS device show <dev>
//! authority→ apply()     plan(change) → nmcli connection modify/up/down
//! ```
//!
//! # Design Decisions
//! - Every interface owns one profile per connection mode
//!   (`static-ip-<dev>`, `dynamic-ip-<dev>`, `dhcp-server-<dev>`,
//!   `station-<dev>`, `hotspot-<dev>`). Switching mode disables autoconnect on
//!   the others and brings the selected one up.
//! - The profile with autoconnect set is the interface's current mode; none
//!   set means disabled.
//! - Command plans are pure data so they can be tested without a host.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::process::Command;

use crate::authority::{Change, ChangeSet};
use serde_json::json;

use crate::interfaces::{
    parse_config, prefix_netmask, AddressConfig, ConnectionMode, Interface, InterfaceKind,
    LinkState, PayloadError,
};

use super::{BackendError, DiscoveredDevice, InterfaceSource, NetworkApplier, StatusObservation};

const STATIC_DNS: &str = "8.8.8.8 8.8.4.4";

/// One `nmcli` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NmcliCommand {
    pub args: Vec<String>,
    /// Failures are logged and skipped (e.g. bringing down an inactive profile).
    pub ignore_error: bool,
}

impl NmcliCommand {
    fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ignore_error: false,
        }
    }

    fn ignoring_errors(mut self) -> Self {
        self.ignore_error = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct NmcliBackend {
    use_sudo: bool,
    wait_secs: u64,
}

impl NmcliBackend {
    pub fn new(use_sudo: bool, wait_secs: u64) -> Self {
        Self {
            use_sudo,
            wait_secs,
        }
    }

    fn run(&self, args: &[String]) -> Result<String, BackendError> {
        let mut command = if self.use_sudo {
            let mut c = Command::new("sudo");
            c.arg("nmcli");
            c
        } else {
            Command::new("nmcli")
        };
        command.args(args);

        let rendered = self.render(args);
        tracing::debug!(command = %rendered, "Running nmcli");

        let output = command.output().map_err(|source| BackendError::Spawn {
            command: rendered.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(BackendError::Command {
                command: rendered,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn execute(&self, command: &NmcliCommand) -> Result<(), BackendError> {
        match self.run(&command.args) {
            Ok(_) => Ok(()),
            Err(e) if command.ignore_error => {
                tracing::debug!(error = %e, "Ignoring nmcli failure");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn render(&self, args: &[String]) -> String {
        let prefix = if self.use_sudo { "sudo nmcli" } else { "nmcli" };
        format!("{} {}", prefix, args.join(" "))
    }

    fn profiles(&self) -> Result<Vec<Profile>, BackendError> {
        let output = self.run(&args([
            "-t",
            "-f",
            "NAME,UUID,AUTOCONNECT",
            "connection",
            "show",
        ]))?;
        Ok(parse_profiles(&output))
    }

    fn ipv4_address(&self, device: &str) -> Result<Option<Ipv4Addr>, BackendError> {
        let output = self.run(&args(["-t", "-f", "IP4.ADDRESS", "device", "show", device]))?;
        Ok(parse_ipv4_address(&output))
    }
}

impl InterfaceSource for NmcliBackend {
    fn discover(&self) -> Result<Vec<DiscoveredDevice>, BackendError> {
        let output = self.run(&args(["-t", "-f", "DEVICE,TYPE", "device"]))?;
        parse_devices(&output).map_err(|line| BackendError::Parse {
            command: "nmcli -t -f DEVICE,TYPE device".to_string(),
            line,
        })
    }

    fn probe(&self) -> Result<Vec<StatusObservation>, BackendError> {
        let output = self.run(&args(["-t", "-f", "DEVICE,STATE", "device"]))?;
        let mut observations = Vec::new();
        for (device, link) in parse_states(&output) {
            let ipv4 = if link.is_connected() {
                self.ipv4_address(&device)?
            } else {
                None
            };
            observations.push(StatusObservation { device, link, ipv4 });
        }
        Ok(observations)
    }

    fn current_config(
        &self,
        device: &str,
        kind: InterfaceKind,
    ) -> Result<Option<AddressConfig>, BackendError> {
        let profiles = self.profiles()?;
        let owned = device_profiles(kind, device, &profiles);
        if owned.profiles.is_empty() {
            return Ok(None);
        }

        let (mode, mut settings) = match owned.active() {
            Some((mode, profile)) => {
                let output = self.run(&args([
                    "-s",
                    "-t",
                    "connection",
                    "show",
                    "uuid",
                    profile.uuid.as_str(),
                ]))?;
                (mode, parse_settings(&output))
            }
            None => (ConnectionMode::Disabled, HashMap::new()),
        };

        // Addresses handed out by DHCP only show up on the device.
        if mode != ConnectionMode::Disabled && !mode.carries_address() {
            let output = self.run(&args([
                "-t",
                "-f",
                "IP4.ADDRESS,IP4.GATEWAY",
                "device",
                "show",
                device,
            ]))?;
            settings.extend(lease_settings(&output));
        }

        config_from_settings(kind, mode, &settings)
            .map(Some)
            .map_err(|e| BackendError::Parse {
                command: format!("nmcli connection show ({})", device),
                line: e.to_string(),
            })
    }
}

impl NetworkApplier for NmcliBackend {
    fn prepare(&self, interfaces: &[Interface]) -> Result<(), BackendError> {
        let profiles = self.profiles()?;
        let wait = self.wait_secs.to_string();
        for interface in interfaces {
            let owned = device_profiles(interface.kind, &interface.device, &profiles);
            for duplicate in &owned.duplicates {
                tracing::warn!(
                    device = %interface.device,
                    profile = %duplicate.name,
                    "Removing duplicate connection profile"
                );
                let uuid = duplicate.uuid.as_str();
                let down = args(["-w", wait.as_str(), "connection", "down", "uuid", uuid]);
                self.execute(&NmcliCommand::new(down).ignoring_errors())?;
                self.execute(&NmcliCommand::new(args(["connection", "delete", "uuid", uuid])))?;
            }

            for (_, name) in profiles_for(interface.kind, &interface.device) {
                if owned.profiles.iter().any(|(_, p)| p.name == name) {
                    continue;
                }
                tracing::info!(
                    device = %interface.device,
                    profile = %name,
                    "Creating connection profile"
                );
                self.execute(&create_profile(interface.kind, &interface.device, &name))?;
            }
        }
        Ok(())
    }

    fn apply(&self, changes: &ChangeSet) -> Result<(), BackendError> {
        for change in changes {
            tracing::info!(
                device = %change.device,
                mode = %change.mode(),
                "Applying configuration"
            );
            for command in plan(change, self.wait_secs) {
                self.execute(&command)?;
            }
        }
        Ok(())
    }
}

/// Profile name backing `mode` on `device`. Disabled has no profile.
pub fn profile_name(mode: ConnectionMode, device: &str) -> Option<String> {
    let prefix = match mode {
        ConnectionMode::Disabled => return None,
        ConnectionMode::StaticIp => "static-ip",
        ConnectionMode::DynamicIp => "dynamic-ip",
        ConnectionMode::DhcpServer => "dhcp-server",
        ConnectionMode::Station => "station",
        ConnectionMode::Ap => "hotspot",
    };
    Some(format!("{}-{}", prefix, device))
}

/// Every profile an interface of `kind` needs.
pub fn profiles_for(kind: InterfaceKind, device: &str) -> Vec<(ConnectionMode, String)> {
    kind.allowed_modes()
        .iter()
        .filter_map(|&mode| profile_name(mode, device).map(|name| (mode, name)))
        .collect()
}

/// One row of `nmcli -t -f NAME,UUID,AUTOCONNECT connection show`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub uuid: String,
    pub autoconnect: bool,
}

/// The profiles backing one interface.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeviceProfiles<'a> {
    /// First profile of each mode, in mode order.
    pub profiles: Vec<(ConnectionMode, &'a Profile)>,
    /// Later profiles reusing one of those names.
    pub duplicates: Vec<&'a Profile>,
}

impl<'a> DeviceProfiles<'a> {
    /// The profile NetworkManager brings up on its own, if any.
    pub fn active(&self) -> Option<(ConnectionMode, &'a Profile)> {
        self.profiles
            .iter()
            .find(|(_, profile)| profile.autoconnect)
            .copied()
    }
}

pub fn device_profiles<'a>(
    kind: InterfaceKind,
    device: &str,
    profiles: &'a [Profile],
) -> DeviceProfiles<'a> {
    let mut owned = DeviceProfiles::default();
    for (mode, name) in profiles_for(kind, device) {
        let mut matching = profiles.iter().filter(|profile| profile.name == name);
        if let Some(first) = matching.next() {
            owned.profiles.push((mode, first));
            owned.duplicates.extend(matching);
        }
    }
    owned
}

/// Rebuild an interface configuration from `nmcli connection show` settings.
/// A profile without a gateway routes through its own address.
pub fn config_from_settings(
    kind: InterfaceKind,
    mode: ConnectionMode,
    settings: &HashMap<String, String>,
) -> Result<AddressConfig, PayloadError> {
    let setting = |key: &str| settings.get(key).map(String::as_str).unwrap_or_default();

    let (ip, mask) = setting("ipv4.addresses")
        .split(',')
        .next()
        .and_then(|address| address.trim().split_once('/'))
        .map(|(ip, bits)| {
            let mask = bits
                .parse::<u8>()
                .ok()
                .and_then(prefix_netmask)
                .map(|mask| mask.to_string())
                .unwrap_or_default();
            (ip.to_string(), mask)
        })
        .unwrap_or_default();
    let route = match setting("ipv4.gateway") {
        "" if mode.carries_address() => ip.clone(),
        gateway => gateway.to_string(),
    };

    let mut payload = json!({
        "connection_type": mode.as_str(),
        "ip": ip,
        "mask": mask,
        "route": route,
    });
    if kind.is_wireless() {
        payload["ssid"] = json!(setting("802-11-wireless.ssid"));
        payload["passphrase"] = json!(setting("802-11-wireless-security.psk"));
    }
    parse_config(kind, &payload)
}

fn create_profile(kind: InterfaceKind, device: &str, name: &str) -> NmcliCommand {
    let mut command = args(["connection", "add", "type"]);
    match kind {
        InterfaceKind::Ethernet => command.push("ethernet".into()),
        // Wireless profiles need an SSID at creation; the real one is set on apply.
        InterfaceKind::Wifi | InterfaceKind::Ap => {
            command.extend(args(["wifi", "ssid", device]));
        }
    }
    command.extend(args(["ifname", device, "con-name", name, "autoconnect", "no"]));
    NmcliCommand::new(command)
}

/// Commands that move `change.device` into its committed configuration.
pub fn plan(change: &Change, wait_secs: u64) -> Vec<NmcliCommand> {
    let device = &change.device;
    let wait = wait_secs.to_string();
    let target = profile_name(change.mode(), device);
    let mut commands = Vec::new();

    for (_, name) in profiles_for(change.kind(), device) {
        if Some(&name) == target.as_ref() {
            continue;
        }
        commands.push(NmcliCommand::new(args([
            "connection",
            "modify",
            name.as_str(),
            "connection.autoconnect",
            "no",
        ])));
        commands.push(
            NmcliCommand::new(args(["-w", wait.as_str(), "connection", "down", name.as_str()]))
                .ignoring_errors(),
        );
    }

    let Some(name) = target else {
        return commands;
    };

    let mut modify = args(["connection", "modify", name.as_str()]);
    modify.extend(settings(&change.config, device));
    modify.extend(args(["connection.autoconnect", "yes"]));
    commands.push(NmcliCommand::new(modify));

    if let Some(wireless) = change.config.wireless() {
        if wireless.passphrase.is_empty() {
            commands.push(
                NmcliCommand::new(args([
                    "connection",
                    "modify",
                    name.as_str(),
                    "remove",
                    "802-11-wireless-security",
                ]))
                .ignoring_errors(),
            );
        } else {
            commands.push(NmcliCommand::new(args([
                "connection",
                "modify",
                name.as_str(),
                "802-11-wireless-security.key-mgmt",
                "wpa-psk",
                "802-11-wireless-security.psk",
                wireless.passphrase.as_str(),
            ])));
        }
    }

    commands.push(NmcliCommand::new(args([
        "-w",
        wait.as_str(),
        "connection",
        "up",
        name.as_str(),
    ])));
    commands
}

fn settings(config: &AddressConfig, device: &str) -> Vec<String> {
    let ipv4 = config.ipv4();
    let cidr = ipv4.cidr().unwrap_or_default();
    let route = ipv4.route.to_string();

    match config.mode() {
        ConnectionMode::Disabled => Vec::new(),
        ConnectionMode::StaticIp => args([
            "ipv4.method",
            "manual",
            "ipv4.addresses",
            cidr.as_str(),
            "ipv4.gateway",
            route.as_str(),
            "ipv4.dns",
            STATIC_DNS,
            "ipv6.method",
            "disabled",
        ]),
        ConnectionMode::DynamicIp => args([
            "ipv4.method",
            "auto",
            "ipv4.addresses",
            "",
            "ipv4.gateway",
            "",
            "ipv6.method",
            "auto",
        ]),
        ConnectionMode::DhcpServer => args([
            "ipv4.method",
            "shared",
            "ipv4.addresses",
            cidr.as_str(),
            "ipv4.gateway",
            route.as_str(),
            "ipv6.method",
            "disabled",
        ]),
        ConnectionMode::Station => {
            let ssid = config.wireless().map(|w| w.ssid.as_str()).unwrap_or_default();
            args([
                "connection.interface-name",
                device,
                "802-11-wireless.mode",
                "infrastructure",
                "802-11-wireless.ssid",
                ssid,
                "ipv4.method",
                "auto",
            ])
        }
        ConnectionMode::Ap => {
            let ssid = config.wireless().map(|w| w.ssid.as_str()).unwrap_or_default();
            args([
                "connection.interface-name",
                device,
                "802-11-wireless.mode",
                "ap",
                "802-11-wireless.ssid",
                ssid,
                "ipv4.method",
                "shared",
                "ipv4.addresses",
                cidr.as_str(),
                "ipv6.method",
                "disabled",
            ])
        }
    }
}

fn args<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    items.into_iter().map(str::to_string).collect()
}

/// Split one line of `nmcli -t` output into fields, honouring `\:` and `\\`.
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}

/// Parse `NAME:UUID:AUTOCONNECT` lines, skipping anything malformed.
pub fn parse_profiles(output: &str) -> Vec<Profile> {
    output
        .lines()
        .filter_map(|line| match split_terse(line).as_slice() {
            [name, uuid, autoconnect] if !name.is_empty() => Some(Profile {
                name: name.clone(),
                uuid: uuid.clone(),
                autoconnect: autoconnect.as_str() == "yes",
            }),
            _ => None,
        })
        .collect()
}

/// Parse `key:value` lines of `nmcli -t connection show <profile>`. Unset
/// values (`--` or empty) are left out.
pub fn parse_settings(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let fields = split_terse(line);
            let (key, rest) = fields.split_first()?;
            let value = rest.join(":");
            if key.is_empty() || value.is_empty() || value == "--" {
                return None;
            }
            Some((key.clone(), value))
        })
        .collect()
}

/// Device lease from `IP4.ADDRESS[n]` / `IP4.GATEWAY` lines, keyed like
/// profile settings.
pub fn lease_settings(output: &str) -> HashMap<String, String> {
    let device = parse_settings(output);
    let mut settings = HashMap::new();
    if let Some(address) = device.get("IP4.ADDRESS[1]") {
        settings.insert("ipv4.addresses".to_string(), address.clone());
    }
    if let Some(gateway) = device.get("IP4.GATEWAY") {
        settings.insert("ipv4.gateway".to_string(), gateway.clone());
    }
    settings
}

/// Parse `DEVICE:TYPE` lines. Returns the offending line on malformed input.
pub fn parse_devices(output: &str) -> Result<Vec<DiscoveredDevice>, String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match split_terse(line).as_slice() {
            [device, device_type] if !device.is_empty() => {
                Ok(DiscoveredDevice::new(device.clone(), device_type.clone()))
            }
            _ => Err(line.to_string()),
        })
        .collect()
}

/// Parse `DEVICE:STATE` lines, skipping anything malformed.
pub fn parse_states(output: &str) -> Vec<(String, LinkState)> {
    output
        .lines()
        .filter_map(|line| match split_terse(line).as_slice() {
            [device, state] if !device.is_empty() => {
                Some((device.clone(), LinkState::parse(state)))
            }
            _ => None,
        })
        .collect()
}

/// First address of `IP4.ADDRESS[n]:a.b.c.d/len` lines.
pub fn parse_ipv4_address(output: &str) -> Option<Ipv4Addr> {
    output.lines().find_map(|line| {
        let fields = split_terse(line);
        let value = fields.get(1)?;
        value.split('/').next()?.parse().ok()
    })
}
