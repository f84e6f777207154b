//! Configuration authority error types.
//!
//! Every failure carries the device and a reason so callers can correct and
//! resubmit. Validation failures never leave partial state behind; an
//! [`AuthorityError::Apply`] means the registry holds the intended state but
//! the host has not caught up.

use serde::Serialize;

use crate::backend::BackendError;
use crate::interfaces::RegistryError;

/// Why one entry of a write request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnknownInterface,
    InvalidConfigShape,
}

/// One rejected entry of a write request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub device: String,
    pub kind: IssueKind,
    pub reason: String,
}

impl ValidationIssue {
    pub fn unknown_interface(device: &str) -> Self {
        Self {
            device: device.to_string(),
            kind: IssueKind::UnknownInterface,
            reason: "unknown interface".to_string(),
        }
    }

    pub fn invalid_shape(device: &str, reason: impl Into<String>) -> Self {
        Self {
            device: device.to_string(),
            kind: IssueKind::InvalidConfigShape,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    /// A read referenced a device that is unknown or hidden.
    #[error("interface not found: {device}")]
    NotFound { device: String },

    /// A write referenced a device that is unknown or hidden.
    #[error("unknown interface: {device}")]
    UnknownInterface { device: String },

    #[error("invalid configuration for {device}: {reason}")]
    InvalidConfigShape { device: String, reason: String },

    /// Aggregate rejection of a multi-device request.
    #[error("configuration rejected: {}", summarize(.issues))]
    ValidationFailed { issues: Vec<ValidationIssue> },

    /// The commit succeeded but the backend could not apply it.
    #[error("configuration stored but not applied: {0}")]
    Apply(#[from] BackendError),

    #[error(transparent)]
    Registry(RegistryError),
}

impl AuthorityError {
    /// Structured per-device details, if any.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        match self {
            AuthorityError::ValidationFailed { issues } => issues.clone(),
            AuthorityError::UnknownInterface { device } | AuthorityError::NotFound { device } => {
                vec![ValidationIssue::unknown_interface(device)]
            }
            AuthorityError::InvalidConfigShape { device, reason } => {
                vec![ValidationIssue::invalid_shape(device, reason.clone())]
            }
            AuthorityError::Apply(_) | AuthorityError::Registry(_) => Vec::new(),
        }
    }
}

impl From<RegistryError> for AuthorityError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { device } => AuthorityError::NotFound { device },
            RegistryError::InvalidConfig { device, reason } => {
                AuthorityError::InvalidConfigShape { device, reason }
            }
            other => AuthorityError::Registry(other),
        }
    }
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{}: {}", issue.device, issue.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias used throughout the authority.
pub type Result<T> = std::result::Result<T, AuthorityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failed_lists_every_issue() {
        let err = AuthorityError::ValidationFailed {
            issues: vec![
                ValidationIssue::unknown_interface("eth9"),
                ValidationIssue::invalid_shape("eth0", "missing parameter `ip`"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "configuration rejected: eth9: unknown interface; eth0: missing parameter `ip`"
        );
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn registry_errors_map_to_typed_variants() {
        let err = AuthorityError::from(RegistryError::NotFound { device: "eth0".into() });
        assert!(matches!(err, AuthorityError::NotFound { .. }));

        let err = AuthorityError::from(RegistryError::InvalidConfig {
            device: "eth0".into(),
            reason: "bad".into(),
        });
        assert!(matches!(err, AuthorityError::InvalidConfigShape { .. }));
    }
}
