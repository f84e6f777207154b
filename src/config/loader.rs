//! Configuration loading from disk.
//!
//! A defaults file is overlaid by the operator's file, table by table, so the
//! operator file only needs the keys it changes.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Defaults file looked up next to the working directory.
pub const DEFAULTS_FILE: &str = "network-configuration.default.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a single TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    ConfigSources::new(None, Some(path.to_path_buf())).load()
}

/// The files a configuration is assembled from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
    /// Optional; skipped silently when absent.
    pub defaults: Option<PathBuf>,
    /// Operator file; a missing file is reported and skipped.
    pub overlay: Option<PathBuf>,
}

impl ConfigSources {
    pub fn new(defaults: Option<PathBuf>, overlay: Option<PathBuf>) -> Self {
        Self { defaults, overlay }
    }

    /// Files that exist right now, for the watcher.
    pub fn paths(&self) -> Vec<PathBuf> {
        [&self.defaults, &self.overlay]
            .into_iter()
            .flatten()
            .filter(|path| path.exists())
            .cloned()
            .collect()
    }

    pub fn load(&self) -> Result<ServiceConfig, ConfigError> {
        let mut table = toml::Table::new();

        if let Some(path) = self.defaults.as_deref().filter(|p| p.exists()) {
            merge(&mut table, read_table(path)?);
        }
        if let Some(path) = self.overlay.as_deref() {
            if path.exists() {
                merge(&mut table, read_table(path)?);
            } else {
                tracing::warn!(path = %path.display(), "Configuration file not found, using defaults");
            }
        }

        let origin = self
            .overlay
            .clone()
            .or_else(|| self.defaults.clone())
            .unwrap_or_default();
        let config: ServiceConfig = toml::Value::Table(table)
            .try_into()
            .map_err(|source| ConfigError::Parse { path: origin, source })?;

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    content.parse::<toml::Table>().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Overlay `overlay` onto `base`, recursing into tables present in both.
fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn overlay_wins_key_by_key() {
        let defaults = file(
            "[server]\nport = 8080\naddress = \"0.0.0.0\"\n[ap]\nhide_in_ui = true\ninterface_device = \"wlan_ap\"\n",
        );
        let overlay = file("[server]\nport = 9000\n");

        let config = ConfigSources::new(
            Some(defaults.path().to_path_buf()),
            Some(overlay.path().to_path_buf()),
        )
        .load()
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.address, "0.0.0.0");
        assert!(config.ap.hide_in_ui);
        assert_eq!(config.ap.interface_device, "wlan_ap");
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let config = ConfigSources::new(
            Some(PathBuf::from("/nonexistent/defaults.toml")),
            Some(PathBuf::from("/nonexistent/overlay.toml")),
        )
        .load()
        .unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn reports_parse_and_validation_errors() {
        let broken = file("[server\nport = 1");
        assert!(matches!(load_config(broken.path()), Err(ConfigError::Parse { .. })));

        let wrong_type = file("[server]\nport = \"eighty\"\n");
        assert!(matches!(load_config(wrong_type.path()), Err(ConfigError::Parse { .. })));

        let invalid = file("[server]\nport = 0\n");
        match load_config(invalid.path()) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors[0].field, "server.port"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
