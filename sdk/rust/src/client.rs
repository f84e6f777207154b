//! Client for the network configuration API.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Runtime state of one interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceStatus {
    pub status: String,
    pub message: String,
    pub error: bool,
    pub ipv4: Option<String>,
}

/// One rejected entry of a configuration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub device: String,
    pub kind: String,
    pub reason: String,
}

/// Error body returned by the API.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub status: String,
    pub interfaces: usize,
}

#[derive(Debug)]
pub enum SdkError {
    Http(reqwest::Error),
    Api { status: u16, body: ApiErrorBody },
    Decode(serde_json::Error),
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdkError::Http(e) => write!(f, "request failed: {}", e),
            SdkError::Api { status, body } => {
                write!(f, "server returned {}: {}", status, body.error)
            }
            SdkError::Decode(e) => write!(f, "invalid response: {}", e),
        }
    }
}

impl std::error::Error for SdkError {}

impl From<reqwest::Error> for SdkError {
    fn from(e: reqwest::Error) -> Self {
        SdkError::Http(e)
    }
}

impl SdkError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            SdkError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn issues(&self) -> &[Issue] {
        match self {
            SdkError::Api { body, .. } => &body.issues,
            _ => &[],
        }
    }
}

pub struct NetconfClient {
    client: Client,
    base_url: String,
}

impl NetconfClient {
    /// `base_url` includes the reverse-proxy prefix, if any.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn status(&self) -> Result<BTreeMap<String, InterfaceStatus>, SdkError> {
        self.get("/api/status").await
    }

    pub async fn config(&self) -> Result<BTreeMap<String, Value>, SdkError> {
        self.get("/api/config").await
    }

    pub async fn interfaces(&self) -> Result<Vec<String>, SdkError> {
        self.get("/api/interfaces").await
    }

    pub async fn interface_config(&self, device: &str) -> Result<Value, SdkError> {
        self.get(&format!("/api/{}/config", device)).await
    }

    pub async fn service(&self) -> Result<ServiceInfo, SdkError> {
        self.get("/api/service").await
    }

    /// Apply several interfaces at once. Either all entries are accepted or
    /// none.
    pub async fn apply_config(&self, config: &Value) -> Result<(), SdkError> {
        self.post("/api/config", config).await
    }

    pub async fn apply_interface_config(
        &self,
        device: &str,
        config: &Value,
    ) -> Result<(), SdkError> {
        self.post(&format!("/api/{}/config", device), config).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SdkError> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        let text = check(resp).await?;
        serde_json::from_str(&text).map_err(SdkError::Decode)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<(), SdkError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        check(resp).await.map(|_| ())
    }
}

async fn check(resp: Response) -> Result<String, SdkError> {
    let status = resp.status();
    let text = resp.text().await?;
    if status.is_success() {
        return Ok(text);
    }
    let body = serde_json::from_str(&text).unwrap_or_else(|_| ApiErrorBody {
        error: text,
        issues: Vec::new(),
    });
    Err(SdkError::Api {
        status: status.as_u16(),
        body,
    })
}
