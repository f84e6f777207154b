//! Service lifecycle.
//!
//! ```text
//!            enable_server = true
//!   Inactive ───────────────────────▶ Active (HTTP server running)
//!      ▲                                │
//!      └────────────────────────────────┘
//!            enable_server = false
//!
//!   Active ──bind settings changed──▶ Active (server restarted)
//!   any    ──shutdown──▶ stopped
//! ```

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use crate::authority::{ConfigAuthority, Visibility};
use crate::config::{ServerConfig, ServiceConfig};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Active,
    Inactive,
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("invalid listen address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server failed: {0}")]
    Server(#[source] std::io::Error),
}

pub struct Supervisor {
    authority: Arc<ConfigAuthority>,
    config: ServiceConfig,
    updates: Option<mpsc::UnboundedReceiver<ServiceConfig>>,
    shutdown: Shutdown,
}

impl Supervisor {
    pub fn new(
        authority: Arc<ConfigAuthority>,
        config: ServiceConfig,
        updates: Option<mpsc::UnboundedReceiver<ServiceConfig>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            authority,
            config,
            updates,
            shutdown,
        }
    }

    pub fn state(&self) -> ServiceState {
        if self.config.server.enable_server {
            ServiceState::Active
        } else {
            ServiceState::Inactive
        }
    }

    /// Run until shutdown.
    ///
    /// A bind failure at startup is returned. A reload whose listener cannot
    /// be bound is logged and the previous server settings stay in effect.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let mut pending: Option<TcpListener> = None;
        loop {
            if self.shutdown.is_triggered() {
                return Ok(());
            }
            match self.state() {
                ServiceState::Inactive => {
                    tracing::info!("Server disabled, service inactive");
                    tokio::select! {
                        _ = self.shutdown.wait() => return Ok(()),
                        update = next_update(&mut self.updates) => {
                            let previous = self.config.server.clone();
                            self.reconfigure(update);
                            if self.config.server.enable_server {
                                match bind(&self.config.server).await {
                                    Ok(listener) => pending = Some(listener),
                                    Err(e) => {
                                        tracing::error!(
                                            error = %e,
                                            "Cannot enable server, staying inactive"
                                        );
                                        self.config.server = previous;
                                    }
                                }
                            }
                        }
                    }
                }
                ServiceState::Active => {
                    let listener = match pending.take() {
                        Some(listener) => listener,
                        None => bind(&self.config.server).await?,
                    };
                    match self.serve(listener).await? {
                        Served::Shutdown => return Ok(()),
                        Served::Disabled => {}
                        Served::Restart(listener) => pending = listener,
                    }
                }
            }
        }
    }

    /// Serve on `listener` until shutdown or until a reload disables the
    /// server or needs different server settings.
    async fn serve(&mut self, listener: TcpListener) -> Result<Served, SupervisorError> {
        let server_config = self.config.server.clone();
        if let Ok(address) = listener.local_addr() {
            tracing::info!(address = %address, "Service active");
        }

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let shutdown = self.shutdown.clone();
        let server = HttpServer::new(self.authority.clone(), server_config.clone());
        let mut handle = tokio::spawn(server.run(listener, async move {
            tokio::select! {
                _ = shutdown.wait() => {}
                _ = stop_rx => {}
            }
        }));

        let outcome = loop {
            tokio::select! {
                result = &mut handle => {
                    // Only returns early on a serve error or shutdown.
                    flatten(result)?;
                    return Ok(Served::Shutdown);
                }
                update = next_update(&mut self.updates) => {
                    self.reconfigure(update);
                    if let Some(outcome) = self.after_reload(&server_config).await {
                        break outcome;
                    }
                }
            }
        };

        tracing::info!("Server settings changed, restarting listener");
        let _ = stop_tx.send(());
        flatten(handle.await)?;
        Ok(outcome)
    }

    /// Decide what a reload means for the running server. A new address is
    /// bound while the old server still runs.
    async fn after_reload(&mut self, current: &ServerConfig) -> Option<Served> {
        let next = self.config.server.clone();
        if !next.enable_server {
            return Some(Served::Disabled);
        }
        if !current.needs_rebind(&next) {
            return None;
        }
        if current.same_listener(&next) {
            // Router settings only; the address is rebound once the old
            // server has drained.
            return Some(Served::Restart(None));
        }
        match bind(&next).await {
            Ok(listener) => Some(Served::Restart(Some(listener))),
            Err(e) => {
                tracing::error!(error = %e, "Keeping current listener and server settings");
                self.config.server = current.clone();
                None
            }
        }
    }

    fn reconfigure(&mut self, update: ServiceConfig) {
        self.authority
            .set_visibility(Visibility::from_ap_config(&update.ap));
        if update.interfaces != self.config.interfaces
            || update.ethernet != self.config.ethernet
            || update.wifi != self.config.wifi
        {
            tracing::warn!("Interface settings changed; they take effect after a restart");
        }
        self.config = update;
    }
}

/// Why [`Supervisor::serve`] returned.
enum Served {
    Shutdown,
    Disabled,
    /// Serve again, on the given listener if one was bound ahead.
    Restart(Option<TcpListener>),
}

async fn bind(config: &ServerConfig) -> Result<TcpListener, SupervisorError> {
    let address = config
        .socket_addr()
        .map_err(|source| SupervisorError::Address {
            address: config.address.clone(),
            source,
        })?;
    TcpListener::bind(address)
        .await
        .map_err(|source| SupervisorError::Bind { address, source })
}

fn flatten(
    result: Result<Result<(), std::io::Error>, tokio::task::JoinError>,
) -> Result<(), SupervisorError> {
    match result {
        Ok(inner) => inner.map_err(SupervisorError::Server),
        Err(e) => Err(SupervisorError::Server(std::io::Error::other(e))),
    }
}

/// Next configuration update; pends forever once the watcher is gone.
async fn next_update(
    updates: &mut Option<mpsc::UnboundedReceiver<ServiceConfig>>,
) -> ServiceConfig {
    if let Some(rx) = updates.as_mut() {
        if let Some(config) = rx.recv().await {
            return config;
        }
        *updates = None;
    }
    std::future::pending().await
}
