//! Write requests and the change sets they produce.

use indexmap::IndexMap;
use serde_json::Value;

use crate::interfaces::payload::json_type_name;
use crate::interfaces::{AddressConfig, ConnectionMode, InterfaceKind, PayloadError};

/// An externally supplied device -> payload mapping, untyped until validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyRequest {
    entries: IndexMap<String, Value>,
}

impl ApplyRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, device: impl Into<String>, payload: Value) -> Self {
        self.entries.insert(device.into(), payload);
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(device, payload)| (device.as_str(), payload))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Value> for ApplyRequest {
    type Error = PayloadError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self {
                entries: map.into_iter().collect(),
            }),
            other => Err(PayloadError::NotAnObject(json_type_name(&other))),
        }
    }
}

/// One committed configuration change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub device: String,
    pub previous: AddressConfig,
    pub config: AddressConfig,
}

impl Change {
    pub fn kind(&self) -> InterfaceKind {
        self.config.kind()
    }

    pub fn mode(&self) -> ConnectionMode {
        self.config.mode()
    }

    /// True when the committed configuration equals the one it replaced.
    pub fn is_unchanged(&self) -> bool {
        self.previous == self.config
    }
}

/// The full validated set of changes of one request, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new(changes: Vec<Change>) -> Self {
        Self { changes }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|c| c.device.as_str())
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
