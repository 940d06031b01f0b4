//! File target: renders the new snapshot to disk.

use super::{Target, TargetKind};
use crate::core::Snapshot;
use crate::error::{Result, WatchError, io_err};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

/// Output layout for [`FileTarget`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// The whole snapshot as one JSON object.
    #[default]
    Json,
    /// One `KEY=value` line per entry.
    Env,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Env => f.write_str("env"),
        }
    }
}

impl FromStr for FileFormat {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "env" => Ok(Self::Env),
            other => Err(WatchError::Config(format!(
                "unknown target format '{}' found. Currently, allowed formats are 'env', 'json'",
                other
            ))),
        }
    }
}

/// Writes the new snapshot to a file, replacing its previous contents.
///
/// # Examples
///
/// ```rust
/// use vaultwatch::targets::{FileFormat, FileTarget};
///
/// let target = FileTarget::new("/run/secrets/app.env", FileFormat::Env);
/// ```
#[derive(Debug, Clone)]
pub struct FileTarget {
    path: PathBuf,
    format: FileFormat,
}

impl FileTarget {
    /// Create a file target.
    pub fn new(path: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Render a snapshot in this target's format.
    pub fn render(&self, snapshot: &Snapshot) -> Result<String> {
        match self.format {
            FileFormat::Json => Ok(serde_json::to_string(snapshot)?),
            FileFormat::Env => Ok(render_env(snapshot)),
        }
    }
}

#[async_trait]
impl Target for FileTarget {
    async fn execute(&self, _old: &Snapshot, new: &Snapshot) -> Result<()> {
        let content = self.render(new)?;

        debug!(
            path = %self.path.display(),
            format = %self.format,
            keys = new.len(),
            "writing key store to file"
        );
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| io_err(&self.path, e))
    }

    fn kind(&self) -> TargetKind {
        TargetKind::File
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// `KEY=value` lines joined by newlines, without a trailing newline.
fn render_env(snapshot: &Snapshot) -> String {
    snapshot
        .iter()
        .map(|(key, value)| format!("{}={}", key, env_value(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strings are written raw; everything else uses its JSON text.
fn env_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
