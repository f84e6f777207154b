//! API handlers.
//!
//! Reads go straight to the authority. Writes run on the blocking pool since
//! the authority takes locks and the backend shells out.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::authority::{ApplyRequest, AuthorityError, ChangeSet, ConfigAuthority};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::interfaces::{AddressConfig, ConfigSnapshot, StatusSnapshot};

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub interfaces: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.authority.status())
}

pub async fn get_config(State(state): State<AppState>) -> Json<ConfigSnapshot> {
    Json(state.authority.config())
}

pub async fn list_interfaces(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.authority.interface_names())
}

pub async fn get_interface_config(
    State(state): State<AppState>,
    Path(interface_id): Path<String>,
) -> Result<Json<AddressConfig>, ApiError> {
    Ok(Json(state.authority.interface_config(&interface_id)?))
}

pub async fn post_config(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let request =
        ApplyRequest::try_from(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let changes = blocking(state.authority, move |authority| authority.submit(&request)).await?;
    tracing::info!(devices = changes.len(), "Configuration request accepted");
    Ok("OK")
}

pub async fn post_interface_config(
    State(state): State<AppState>,
    Path(interface_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    blocking(state.authority, move |authority| {
        authority.submit_interface(&interface_id, &body)
    })
    .await?;
    Ok("OK")
}

pub async fn get_service(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        status: "active",
        interfaces: state.authority.interface_names().len(),
    })
}

async fn blocking<F>(authority: Arc<ConfigAuthority>, f: F) -> Result<ChangeSet, ApiError>
where
    F: FnOnce(&ConfigAuthority) -> Result<ChangeSet, AuthorityError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&authority))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}
