//! HashiCorp Vault KV version 2 snapshot source.

use super::SnapshotSource;
use crate::core::Snapshot;
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use reqwest::{Client, header::HeaderValue};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Header Vault reads the client token from.
const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

/// Envelope returned by `GET /v1/{mount}/data/{path}`.
#[derive(Debug, Deserialize)]
struct KvReadResponse {
    data: Option<KvReadData>,
}

#[derive(Debug, Deserialize)]
struct KvReadData {
    data: Option<JsonValue>,
}

/// Snapshot source reading one secret from a Vault KV v2 engine.
///
/// # Examples
///
/// ```rust,no_run
/// use vaultwatch::sources::VaultSource;
///
/// # fn example() -> vaultwatch::error::Result<()> {
/// let source = VaultSource::builder()
///     .with_host("127.0.0.1")
///     .with_port(8200)
///     .with_path("app/database")
///     .with_token("s.xxxxx")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct VaultSource {
    address: String,
    mount: String,
    path: String,
    token: String,
    client: Client,
}

impl VaultSource {
    /// Create a new builder for constructing a Vault source.
    pub fn builder() -> VaultSourceBuilder {
        VaultSourceBuilder::new()
    }

    /// Full URL of the KV v2 read endpoint for the watched path.
    fn read_url(&self) -> String {
        format!(
            "{}/v1/{}/data/{}",
            self.address,
            self.mount.trim_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl SnapshotSource for VaultSource {
    async fn fetch(&self) -> Result<Snapshot> {
        let mut request = self.client.get(self.read_url());

        if !self.token.is_empty() {
            let header_value = HeaderValue::from_str(&self.token)
                .map_err(|e| WatchError::Store(format!("Invalid Vault token: {}", e)))?;
            request = request.header(VAULT_TOKEN_HEADER, header_value);
        }

        let response = request.send().await.map_err(|e| {
            WatchError::Store(format!(
                "error occurred while listing the secret contents at the path '{}': {}",
                self.path, e
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::Store(format!(
                "Vault answered with status {} for the path '{}': {}",
                status.as_u16(),
                self.path,
                body.trim()
            )));
        }

        let envelope: KvReadResponse = response.json().await.map_err(|e| {
            WatchError::Store(format!("Failed to parse Vault response: {}", e))
        })?;

        match envelope.data.and_then(|d| d.data) {
            None | Some(JsonValue::Null) => Ok(Snapshot::new()),
            Some(JsonValue::Object(map)) => Ok(map.into_iter().collect()),
            Some(other) => Err(WatchError::Store(format!(
                "Expected a key-value object at '{}', found {}",
                self.path,
                json_kind(&other)
            ))),
        }
    }

    fn name(&self) -> String {
        format!(
            "vault:{}/{}",
            self.mount.trim_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Builder for constructing a [`VaultSource`].
pub struct VaultSourceBuilder {
    scheme: String,
    host: Option<String>,
    port: u16,
    mount: String,
    path: Option<String>,
    token: String,
    timeout: Duration,
}

impl VaultSourceBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            scheme: "http".to_string(),
            host: None,
            port: 8200,
            mount: "secret".to_string(),
            path: None,
            token: String::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the Vault host name or IP.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the Vault port. Default is 8200.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the URL scheme. Default is `http`.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Set the KV v2 mount point. Default is `secret`.
    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }

    /// Set the secret path to watch, relative to the mount.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the access token sent with each read.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Set the request timeout. Default is 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the Vault source.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No host or path is provided
    /// - The HTTP client cannot be constructed
    pub fn build(self) -> Result<VaultSource> {
        let host = self
            .host
            .filter(|h| !h.is_empty())
            .ok_or_else(|| WatchError::Config("Vault host is required".to_string()))?;
        let path = self
            .path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| WatchError::Config("Vault path to watch is required".to_string()))?;

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| WatchError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(VaultSource {
            address: format!("{}://{}:{}", self.scheme, host, self.port),
            mount: self.mount,
            path,
            token: self.token,
            client,
        })
    }
}

impl Default for VaultSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
