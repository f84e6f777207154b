//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all API handlers
//! - Mount it under the reverse-proxy path prefix
//! - Wire up middleware (request id, tracing, timeout, body limit, metrics)
//! - Serve until the shutdown future resolves

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::authority::ConfigAuthority;
use crate::config::ServerConfig;
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub authority: Arc<ConfigAuthority>,
}

/// HTTP front end of the configuration authority.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    pub fn new(authority: Arc<ConfigAuthority>, config: ServerConfig) -> Self {
        let router = build_router(authority, &config);
        Self { router, config }
    }

    /// Run the server on `listener` until `shutdown` resolves, then drain.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            prefix = %self.config.path_prefix(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Build the router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(authority: Arc<ConfigAuthority>, config: &ServerConfig) -> Router {
    let state = AppState { authority };

    let api = Router::new()
        .route("/api/status", get(handlers::get_status))
        .route(
            "/api/config",
            get(handlers::get_config).post(handlers::post_config),
        )
        .route("/api/interfaces", get(handlers::list_interfaces))
        .route("/api/service", get(handlers::get_service))
        .route(
            "/api/{interface_id}/config",
            get(handlers::get_interface_config).post(handlers::post_interface_config),
        )
        .with_state(state);

    // Nesting at the root is rejected by axum.
    let prefix = config.path_prefix();
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&prefix, api)
    };

    app.layer(middleware::from_fn(track_metrics))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request.request_id(),
            )
        }))
        .layer(set_request_id_layer())
}

async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
