//! Error types for vaultwatch.

use crate::targets::TargetKind;
use std::path::PathBuf;

/// Result type alias for vaultwatch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur while watching a key store.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Invalid or incomplete configuration. Fatal before the poll loop starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backing secret store could not be read.
    #[error("Key store error: {0}")]
    Store(String),

    /// A target action failed to run.
    #[error("Target error: {0}")]
    Target(String),

    /// The fetch phase failed and the failure budget was exhausted.
    #[error("error occurred while getting the contents of the key store from '{source_name}': {source}")]
    Fetch {
        /// Name of the snapshot source (includes the watched path)
        source_name: String,
        /// The underlying fetch failure
        #[source]
        source: Box<WatchError>,
    },

    /// The dispatch phase failed and the failure budget was exhausted.
    #[error("error occurred while executing the {kind} target ({target}): {source}")]
    Dispatch {
        /// Which target variant was running
        kind: TargetKind,
        /// Path, command, or URL the target acts on
        target: String,
        /// The underlying target failure
        #[source]
        source: Box<WatchError>,
    },

    /// A file used by a target could not be created or written.
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        /// File or directory being accessed
        path: PathBuf,
        /// The underlying failure
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WatchError {
    /// Returns true if this error terminated the poll loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Dispatch { .. })
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> WatchError {
    WatchError::Io {
        path: path.into(),
        source,
    }
}

impl From<config::ConfigError> for WatchError {
    fn from(err: config::ConfigError) -> Self {
        WatchError::Config(err.to_string())
    }
}
