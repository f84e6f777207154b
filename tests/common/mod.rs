//! Shared fixtures for the integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use network_conf_server::authority::{ConfigAuthority, Visibility};
use network_conf_server::backend::{DiscoveredDevice, DryRunBackend, NetworkApplier};
use network_conf_server::config::{InterfaceDefaults, ServerConfig};
use network_conf_server::http::HttpServer;
use network_conf_server::interfaces::{Interface, InterfaceKind, InterfaceRegistry};
use network_conf_server::lifecycle::Shutdown;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// `eth0` and `eth1` wired, `wlan_ap` the hidden access point.
pub fn authority() -> (Arc<ConfigAuthority>, Arc<DryRunBackend>) {
    let backend = Arc::new(DryRunBackend::new(vec![
        DiscoveredDevice::new("eth0", "ethernet"),
        DiscoveredDevice::new("eth1", "ethernet"),
        DiscoveredDevice::new("wlan_ap", "__ap"),
    ]));
    let ethernet = InterfaceDefaults::default()
        .to_config(InterfaceKind::Ethernet)
        .unwrap();
    let ap = InterfaceDefaults::hotspot().to_config(InterfaceKind::Ap).unwrap();
    let interfaces = vec![
        Interface::new("eth0", ethernet.clone()),
        Interface::new("eth1", ethernet),
        Interface::new("wlan_ap", ap),
    ];
    backend.prepare(&interfaces).unwrap();

    let authority = Arc::new(ConfigAuthority::new(
        InterfaceRegistry::new(interfaces).unwrap(),
        Visibility::hiding("wlan_ap"),
        backend.clone(),
    ));
    (authority, backend)
}

#[allow(dead_code)]
pub fn server_config(prefix: &str) -> ServerConfig {
    ServerConfig {
        address: "127.0.0.1".into(),
        port: 0,
        reverse_proxy_path: prefix.into(),
        ..ServerConfig::default()
    }
}

#[allow(dead_code)]
pub fn static_ip(ip: &str) -> Value {
    json!({
        "connection_type": "static_ip",
        "ip": ip,
        "mask": "255.255.255.0",
        "route": "10.0.0.1",
    })
}

/// Serve on an ephemeral port until `shutdown` fires.
#[allow(dead_code)]
pub async fn spawn_server(
    authority: Arc<ConfigAuthority>,
    config: ServerConfig,
    shutdown: Shutdown,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(authority, config);
    tokio::spawn(async move {
        let _ = server.run(listener, async move { shutdown.wait().await }).await;
    });
    addr
}
