//! Webhook target: POSTs both snapshots as JSON.

use super::target::ChangePayload;
use super::{Target, TargetKind};
use crate::core::Snapshot;
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

/// Fixed timeout for each webhook request.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends one `POST` per change with body
/// `{"old_key_store": ..., "new_key_store": ...}`.
///
/// Any response status of 400 or above is a failure; its message carries the
/// status code and the response body.
///
/// # Examples
///
/// ```rust,no_run
/// use vaultwatch::targets::WebhookTarget;
///
/// # fn example() -> vaultwatch::error::Result<()> {
/// let target = WebhookTarget::new("https://hooks.example.com/vault")?
///     .with_bearer_token("hook-secret");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WebhookTarget {
    url: String,
    bearer_token: Option<String>,
    client: Client,
}

impl WebhookTarget {
    /// Create a webhook target for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| WatchError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            bearer_token: None,
            client,
        })
    }

    /// Authenticate with `Authorization: Bearer <token>`. Empty tokens are ignored.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.bearer_token = (!token.is_empty()).then_some(token);
        self
    }
}

#[async_trait]
impl Target for WebhookTarget {
    async fn execute(&self, old: &Snapshot, new: &Snapshot) -> Result<()> {
        let body = serde_json::to_vec(&ChangePayload::new(old, new))?;

        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(token) = &self.bearer_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        debug!(url = %self.url, "triggering webhook request");
        let response = request.send().await.map_err(|e| {
            WatchError::Target(format!(
                "error occurred while making the request to the webhook target: {}",
                e
            ))
        })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            debug!(status = status.as_u16(), "webhook answered with an error status");
            let body = response.text().await.map_err(|e| {
                WatchError::Target(format!(
                    "request ended up with a client/server-side error with status code '{}': error occurred while reading the response body: {}",
                    status.as_u16(),
                    e
                ))
            })?;
            return Err(WatchError::Target(format!(
                "request ended up with a client/server-side error with status code '{}': {}",
                status.as_u16(),
                body
            )));
        }

        debug!(status = status.as_u16(), "webhook delivered");
        Ok(())
    }

    fn kind(&self) -> TargetKind {
        TargetKind::Webhook
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
