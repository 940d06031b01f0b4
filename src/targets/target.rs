//! Target trait and shared change payload.

use crate::core::Snapshot;
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The action variants a key store change can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// POST both snapshots to a URL.
    Webhook,
    /// Render the new snapshot to a file.
    File,
    /// Run a shell command after writing both snapshots to disk.
    Command,
}

impl TargetKind {
    /// All supported kinds.
    pub const ALL: [TargetKind; 3] = [TargetKind::Webhook, TargetKind::File, TargetKind::Command];

    /// Name used on the command line and in settings files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::File => "file",
            Self::Command => "command",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                WatchError::Config(format!(
                    "unknown target type '{}'. Supported: webhook, file, command",
                    s
                ))
            })
    }
}

/// An action run whenever the watched key store changes.
///
/// Implementations perform exactly one externally visible side effect per call
/// and must finish before returning; the poller does not start the next cycle
/// until `execute` resolves. Snapshots are borrowed for the call only.
#[async_trait]
pub trait Target: Send + Sync {
    /// React to a change from `old` to `new`.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error if the side effect could not be completed.
    async fn execute(&self, old: &Snapshot, new: &Snapshot) -> Result<()>;

    /// Which variant this is.
    fn kind(&self) -> TargetKind;

    /// What the target acts on (a path, command, or URL), for logs and errors.
    fn describe(&self) -> String;
}

/// JSON body handed to command and webhook targets.
#[derive(Debug, Serialize)]
pub(crate) struct ChangePayload<'a> {
    pub old_key_store: &'a Snapshot,
    pub new_key_store: &'a Snapshot,
}

impl<'a> ChangePayload<'a> {
    pub(crate) fn new(old: &'a Snapshot, new: &'a Snapshot) -> Self {
        Self {
            old_key_store: old,
            new_key_store: new,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in TargetKind::ALL {
            assert_eq!(kind.as_str().parse::<TargetKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_config_error() {
        let err = "email".parse::<TargetKind>().unwrap_err();
        assert!(matches!(err, WatchError::Config(_)));
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_payload_shape() {
        let old: Snapshot = [("foo".to_string(), json!("bar"))].into_iter().collect();
        let new = Snapshot::new();

        let value = serde_json::to_value(ChangePayload::new(&old, &new)).unwrap();
        assert_eq!(
            value,
            json!({"old_key_store": {"foo": "bar"}, "new_key_store": {}})
        );
    }
}
