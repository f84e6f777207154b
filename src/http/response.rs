//! Error responses.
//!
//! # Status Mapping
//! - unknown or hidden interface → 404
//! - payload that does not fit the interface → 422 with per-device issues
//! - body that is not a JSON object → 400
//! - committed but not applied to the host → 502

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::authority::{AuthorityError, ValidationIssue};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Authority(err) => match err {
                AuthorityError::NotFound { .. } | AuthorityError::UnknownInterface { .. } => {
                    StatusCode::NOT_FOUND
                }
                AuthorityError::InvalidConfigShape { .. }
                | AuthorityError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                AuthorityError::Apply(_) => StatusCode::BAD_GATEWAY,
                AuthorityError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        let issues = match &self {
            ApiError::Authority(err) if status == StatusCode::UNPROCESSABLE_ENTITY => err.issues(),
            _ => Vec::new(),
        };
        let body = ErrorBody {
            error: self.to_string(),
            issues,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;

    #[test]
    fn maps_authority_errors_to_status_codes() {
        let cases = [
            (AuthorityError::NotFound { device: "x".into() }, StatusCode::NOT_FOUND),
            (AuthorityError::UnknownInterface { device: "x".into() }, StatusCode::NOT_FOUND),
            (
                AuthorityError::InvalidConfigShape {
                    device: "x".into(),
                    reason: "bad".into(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AuthorityError::ValidationFailed { issues: Vec::new() },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AuthorityError::Apply(BackendError::Parse {
                    command: "nmcli".into(),
                    line: "?".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    }
}
