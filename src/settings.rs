//! Layered runtime settings.
//!
//! Sources are merged lowest to highest precedence:
//! built-in defaults → optional settings file → `VAULTWATCH_*` environment
//! variables → explicit overrides (command-line flags).

use crate::core::FailureLimit;
use crate::duration::parse_duration;
use crate::error::{Result, WatchError};
use crate::sources::VaultSource;
use crate::targets::{DEFAULT_INTERMEDIATE_FILE, TargetKind};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "VAULTWATCH";

/// Everything needed to start a watch.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the watched secret lives
    pub vault: VaultSettings,
    /// `webhook`, `file`, or `command`
    pub target_type: String,
    /// Time between polls, e.g. `5s`
    pub polling_interval: String,
    /// Consecutive failures tolerated; `-1` for no limit
    pub failure_limit: i64,
    /// Enable debug logging
    pub debug: bool,
    /// Per-variant target settings
    pub target: TargetSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault: VaultSettings::default(),
            target_type: String::new(),
            polling_interval: "5s".to_string(),
            failure_limit: 3,
            debug: false,
            target: TargetSettings::default(),
        }
    }
}

impl Settings {
    /// Start building a layered settings load.
    pub fn loader() -> SettingsLoader {
        SettingsLoader::new()
    }

    /// The selected target variant.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no target type is set or it is unknown.
    pub fn target_kind(&self) -> Result<TargetKind> {
        if self.target_type.is_empty() {
            return Err(WatchError::Config(
                "a target type is required (webhook, file, or command)".to_string(),
            ));
        }
        self.target_type.parse()
    }

    /// The failure limit as a typed value.
    pub fn failure_limit(&self) -> Result<FailureLimit> {
        FailureLimit::from_raw(self.failure_limit)
    }

    /// The polling interval as a duration.
    pub fn polling_interval(&self) -> Result<Duration> {
        parse_duration(&self.polling_interval)
    }

    /// Build the Vault source described by [`Settings::vault`].
    pub fn vault_source(&self) -> Result<VaultSource> {
        VaultSource::builder()
            .with_host(&self.vault.host)
            .with_port(self.vault.port)
            .with_mount(&self.vault.mount)
            .with_path(&self.vault.path)
            .with_token(&self.vault.token)
            .build()
    }
}

/// Vault connection settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Host of the Vault server
    pub host: String,
    /// Port of the Vault server
    pub port: u16,
    /// KV v2 mount point
    pub mount: String,
    /// Secret path to watch
    pub path: String,
    /// Access token allowed to read the path
    pub token: String,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8200,
            mount: "secret".to_string(),
            path: String::new(),
            token: String::new(),
        }
    }
}

impl fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("mount", &self.mount)
            .field("path", &self.path)
            .field("token", &redact(&self.token))
            .finish()
    }
}

/// Settings for each target variant. Only the selected one is read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetSettings {
    /// File target settings
    pub file: FileTargetSettings,
    /// Command target settings
    pub command: CommandTargetSettings,
    /// Webhook target settings
    pub webhook: WebhookTargetSettings,
}

/// File target settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileTargetSettings {
    /// Destination file
    pub path: String,
    /// `json` or `env`
    pub format: String,
}

impl Default for FileTargetSettings {
    fn default() -> Self {
        Self {
            path: String::new(),
            format: "json".to_string(),
        }
    }
}

/// Command target settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandTargetSettings {
    /// Shell command run on each change
    pub command: String,
    /// File the old and new snapshots are written to before the command runs
    pub intermediate_file: String,
}

impl Default for CommandTargetSettings {
    fn default() -> Self {
        Self {
            command: String::new(),
            intermediate_file: DEFAULT_INTERMEDIATE_FILE.to_string(),
        }
    }
}

/// Webhook target settings.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookTargetSettings {
    /// URL receiving the POST
    pub url: String,
    /// Optional bearer token
    pub access_token: String,
}

impl fmt::Debug for WebhookTargetSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookTargetSettings")
            .field("url", &self.url)
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "<redacted>" }
}

/// Merges settings from a file, the environment, and explicit overrides.
///
/// # Examples
///
/// ```rust,no_run
/// use vaultwatch::settings::Settings;
///
/// # fn example() -> vaultwatch::error::Result<()> {
/// let settings = Settings::loader()
///     .with_file("vaultwatch.yaml")
///     .with_override("target_type", "file")
///     .load()?;
/// # Ok(())
/// # }
/// ```
pub struct SettingsLoader {
    file: Option<PathBuf>,
    env_prefix: String,
    overrides: Vec<(String, config::Value)>,
}

impl SettingsLoader {
    /// Create a loader reading `VAULTWATCH_*` environment variables.
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: ENV_PREFIX.to_string(),
            overrides: Vec::new(),
        }
    }

    /// Read a YAML, TOML, or JSON settings file (format from the extension).
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Use a different environment variable prefix.
    ///
    /// Nested keys use `__`, e.g. `VAULTWATCH_VAULT__HOST` sets `vault.host`.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Force a value for a dotted key, e.g. `vault.port`. Highest precedence.
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<config::Value>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Merge all layers into [`Settings`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file is missing or malformed, or a
    /// value has the wrong type.
    pub fn load(self) -> Result<Settings> {
        let mut builder = config::Config::builder();

        if let Some(path) = &self.file {
            if !path.exists() {
                return Err(WatchError::Config(format!(
                    "Settings file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path.clone()).required(true));
        }

        // Values stay strings; numeric and boolean fields are converted during
        // deserialization, so tokens and paths keep leading zeros.
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__"),
        );

        for (key, value) in self.overrides {
            builder = builder.set_override(key, value)?;
        }

        let settings = builder
            .build()
            .map_err(|e| WatchError::Config(format!("Failed to build settings: {}", e)))?;

        settings
            .try_deserialize::<Settings>()
            .map_err(|e| WatchError::Config(format!("Failed to deserialize settings: {}", e)))
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn isolated() -> SettingsLoader {
        Settings::loader().with_env_prefix("VAULTWATCH_UNIT_TEST_UNSET")
    }

    #[test]
    fn test_defaults() {
        let settings = isolated().load().unwrap();

        assert_eq!(settings.vault.port, 8200);
        assert_eq!(settings.vault.mount, "secret");
        assert_eq!(settings.polling_interval().unwrap(), Duration::from_secs(5));
        assert_eq!(settings.failure_limit().unwrap(), FailureLimit::Limited(3));
        assert_eq!(settings.target.file.format, "json");
        assert_eq!(
            settings.target.command.intermediate_file,
            DEFAULT_INTERMEDIATE_FILE
        );
        assert!(settings.target_kind().is_err());
    }

    #[test]
    fn test_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vaultwatch.yaml");
        fs::write(
            &path,
            r#"
vault:
  host: vault.internal
  port: 8300
  path: app/db
target_type: file
polling_interval: 30s
failure_limit: -1
target:
  file:
    path: /run/app.env
    format: env
"#,
        )
        .unwrap();

        let settings = isolated().with_file(&path).load().unwrap();
        assert_eq!(settings.vault.host, "vault.internal");
        assert_eq!(settings.vault.port, 8300);
        assert_eq!(settings.target_kind().unwrap(), TargetKind::File);
        assert_eq!(settings.polling_interval().unwrap(), Duration::from_secs(30));
        assert_eq!(settings.failure_limit().unwrap(), FailureLimit::Unlimited);
        assert_eq!(settings.target.file.path, "/run/app.env");
        assert_eq!(settings.target.file.format, "env");
        assert!(settings.vault_source().is_ok());
    }

    #[test]
    fn test_overrides_beat_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vaultwatch.toml");
        fs::write(
            &path,
            r#"
target_type = "file"
failure_limit = 5
"#,
        )
        .unwrap();

        let settings = isolated()
            .with_file(&path)
            .with_override("target_type", "webhook")
            .with_override("failure_limit", 0i64)
            .load()
            .unwrap();

        assert_eq!(settings.target_kind().unwrap(), TargetKind::Webhook);
        assert_eq!(settings.failure_limit().unwrap(), FailureLimit::Limited(0));
    }

    #[test]
    fn test_missing_file() {
        let result = isolated().with_file("/nonexistent/vaultwatch.yaml").load();
        assert!(matches!(result, Err(WatchError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut settings = Settings::default();
        settings.vault.token = "s.topsecret".to_string();
        settings.target.webhook.access_token = "hook-secret".to_string();

        let printed = format!("{:?}", settings);
        assert!(!printed.contains("s.topsecret"));
        assert!(!printed.contains("hook-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
