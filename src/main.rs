//! vaultwatch: run an action whenever a Vault secret changes.
//!
//! # Usage
//!
//! ```text
//! vaultwatch --vault-host 127.0.0.1 --vault-path app/db --vault-access-token s.xxx \
//!     --target-type file --target-file-path /run/app.env --target-file-format env
//! vaultwatch --config vaultwatch.yaml --debug
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use vaultwatch::prelude::*;
use vaultwatch::settings::SettingsLoader;

#[derive(Parser, Debug)]
#[command(
    name = "vaultwatch",
    version,
    about = "Watch a Vault secret and trigger a file, command, or webhook action on change",
    long_about = None,
)]
struct Cli {
    /// Settings file (YAML, TOML, or JSON). Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host of the vault store backing your secrets
    #[arg(long)]
    vault_host: Option<String>,

    /// Port at which the vault store is running [default: 8200]
    #[arg(long)]
    vault_port: Option<u16>,

    /// Path of the secret in the vault store to watch
    #[arg(long)]
    vault_path: Option<String>,

    /// Access token authorizing to read the above path
    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true)]
    vault_access_token: Option<String>,

    /// KV v2 mount point [default: secret]
    #[arg(long)]
    vault_mount: Option<String>,

    /// Type of action to run on key store changes: webhook, file, or command
    #[arg(long)]
    target_type: Option<String>,

    /// Consecutive failures to bear before exiting; -1 for no limit [default: 3]
    #[arg(long, allow_negative_numbers = true)]
    failure_limit: Option<i64>,

    /// Rate at which the vault store gets polled, e.g. 5s or 500ms [default: 5s]
    #[arg(long)]
    polling_interval: Option<String>,

    /// Run in debug mode
    #[arg(long)]
    debug: bool,

    /// File target: where the new key store is written
    #[arg(long)]
    target_file_path: Option<String>,

    /// File target: output format, json or env [default: json]
    #[arg(long)]
    target_file_format: Option<String>,

    /// Command target: command to execute on each change
    #[arg(long)]
    target_command: Option<String>,

    /// Command target: file receiving {"old_key_store", "new_key_store"} before each run
    #[arg(long)]
    intermediate_file_for_changed_keystore: Option<String>,

    /// Webhook target: URL receiving a POST on each change
    #[arg(long)]
    webhook_url: Option<String>,

    /// Webhook target: bearer token sent with each request
    #[arg(long)]
    webhook_access_token: Option<String>,
}

impl Cli {
    /// Layer flags over file and environment settings.
    fn settings(&self) -> vaultwatch::error::Result<Settings> {
        let mut loader = Settings::loader();
        if let Some(path) = &self.config {
            loader = loader.with_file(path);
        }

        loader = override_str(loader, "vault.host", &self.vault_host);
        loader = override_str(loader, "vault.path", &self.vault_path);
        loader = override_str(loader, "vault.token", &self.vault_access_token);
        loader = override_str(loader, "vault.mount", &self.vault_mount);
        loader = override_str(loader, "target_type", &self.target_type);
        loader = override_str(loader, "polling_interval", &self.polling_interval);
        loader = override_str(loader, "target.file.path", &self.target_file_path);
        loader = override_str(loader, "target.file.format", &self.target_file_format);
        loader = override_str(loader, "target.command.command", &self.target_command);
        loader = override_str(
            loader,
            "target.command.intermediate_file",
            &self.intermediate_file_for_changed_keystore,
        );
        loader = override_str(loader, "target.webhook.url", &self.webhook_url);
        loader = override_str(loader, "target.webhook.access_token", &self.webhook_access_token);

        if let Some(port) = self.vault_port {
            loader = loader.with_override("vault.port", i64::from(port));
        }
        if let Some(limit) = self.failure_limit {
            loader = loader.with_override("failure_limit", limit);
        }
        if self.debug {
            loader = loader.with_override("debug", true);
        }

        loader.load()
    }
}

fn override_str(loader: SettingsLoader, key: &str, value: &Option<String>) -> SettingsLoader {
    match value {
        Some(v) => loader.with_override(key, v.as_str()),
        None => loader,
    }
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_level = if debug { "debug" } else { "info" };
    let filter = if debug {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Cancel `token` on SIGTERM, SIGHUP, or Ctrl-C.
fn spawn_signal_handler(token: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!(signal = "SIGTERM", "receiving the signal, exiting"),
                _ = sighup.recv() => info!(signal = "SIGHUP", "receiving the signal, exiting"),
                _ = tokio::signal::ctrl_c() => info!(signal = "SIGINT", "receiving the signal, exiting"),
            }
            token.cancel();
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(signal = "ctrl-c", "receiving the signal, exiting");
        }
        token.cancel();
    });

    Ok(())
}

async fn run(settings: Settings) -> Result<()> {
    let kind = settings.target_kind().context("unknown target type found")?;
    let target = build_target(kind, &settings.target)
        .with_context(|| format!("invalid {} target settings", kind))?;
    let source = settings
        .vault_source()
        .context("failed to initialize the vault client as per the provided parameters")?;

    let mut poller = Poller::builder()
        .with_source(source)
        .with_boxed_target(target)
        .with_interval(settings.polling_interval()?)
        .with_failure_limit(settings.failure_limit()?)
        .build()?;
    debug!("vault client setup successfully");

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone())?;

    poller.run(shutdown).await?;
    info!("poller stopped");
    Ok(())
}

/// Log line for the error that ended the process.
fn exit_message(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<WatchError>() {
        Some(watch) if watch.is_terminal() => "failure limit exceeded, stopping the watch",
        _ => "failed to start the watch",
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(err) => {
            init_tracing(cli.debug);
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(settings.debug);
    debug!(?settings, "parsed options");

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let detail = format!("{err:#}");
            error!(error = %detail, "{}", exit_message(&err));
            ExitCode::FAILURE
        }
    }
}
