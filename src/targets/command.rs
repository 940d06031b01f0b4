//! Command target: runs a shell command with both snapshots staged on disk.

use super::target::ChangePayload;
use super::{Target, TargetKind};
use crate::core::Snapshot;
use crate::error::{Result, WatchError, io_err};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Where the old and new snapshots are written unless configured otherwise.
pub const DEFAULT_INTERMEDIATE_FILE: &str = "/tmp/vaultwatch/keystore.json";

/// Runs `sh -c <command>` after writing
/// `{"old_key_store": ..., "new_key_store": ...}` to an intermediate file.
///
/// The command reads the snapshots from that file; nothing is passed as
/// arguments. A nonzero exit status is a failure.
#[derive(Debug, Clone)]
pub struct CommandTarget {
    command: String,
    intermediate_file: PathBuf,
}

impl CommandTarget {
    /// Create a command target using [`DEFAULT_INTERMEDIATE_FILE`].
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            intermediate_file: PathBuf::from(DEFAULT_INTERMEDIATE_FILE),
        }
    }

    /// Stage snapshots at a different path.
    pub fn with_intermediate_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.intermediate_file = path.into();
        self
    }

    /// Path the snapshots are written to before each run.
    pub fn intermediate_file(&self) -> &Path {
        &self.intermediate_file
    }

    async fn stage(&self, old: &Snapshot, new: &Snapshot) -> Result<()> {
        let contents = serde_json::to_vec(&ChangePayload::new(old, new))?;

        if let Some(parent) = self
            .intermediate_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }

        debug!(
            path = %self.intermediate_file.display(),
            "writing the old and new key store to the intermediate file"
        );
        tokio::fs::write(&self.intermediate_file, contents)
            .await
            .map_err(|e| io_err(&self.intermediate_file, e))
    }
}

#[async_trait]
impl Target for CommandTarget {
    async fn execute(&self, old: &Snapshot, new: &Snapshot) -> Result<()> {
        self.stage(old, new).await?;

        debug!(command = %self.command, "executing target command");
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .output()
            .await
            .map_err(|e| {
                WatchError::Target(format!(
                    "error occurred while executing the target command '{}': {}",
                    self.command, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WatchError::Target(format!(
                "error occurred while executing the target command '{}': {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }

    fn kind(&self) -> TargetKind {
        TargetKind::Command
    }

    fn describe(&self) -> String {
        self.command.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intermediate_file() {
        let target = CommandTarget::new("true");
        assert_eq!(
            target.intermediate_file(),
            Path::new(DEFAULT_INTERMEDIATE_FILE)
        );
        assert_eq!(target.describe(), "true");
        assert_eq!(target.kind(), TargetKind::Command);
    }

    #[test]
    fn test_with_intermediate_file() {
        let target = CommandTarget::new("true").with_intermediate_file("/var/tmp/ks.json");
        assert_eq!(target.intermediate_file(), Path::new("/var/tmp/ks.json"));
    }
}
