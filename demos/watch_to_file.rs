//! Example: mirror a Vault secret into an env file.
//!
//! Settings come from `VAULTWATCH_*` variables, with the target forced to a
//! file under a temporary directory:
//!
//! ```text
//! VAULTWATCH_VAULT__HOST=127.0.0.1 VAULTWATCH_VAULT__PATH=app \
//! VAULTWATCH_VAULT__TOKEN=root cargo run --example watch_to_file
//! ```
//!
//! Press Ctrl-C to stop.

use tokio_util::sync::CancellationToken;
use vaultwatch::prelude::*;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== Watch to File Example ===\n");

    let temp_dir = tempfile::tempdir()?;
    let output = temp_dir.path().join("app.env");

    let settings = Settings::loader()
        .with_override("target_type", "file")
        .with_override("target.file.path", output.display().to_string())
        .with_override("target.file.format", "env")
        .with_override("polling_interval", "2s")
        .load()?;

    let target = build_target(settings.target_kind()?, &settings.target)?;
    let mut poller = Poller::builder()
        .with_source(settings.vault_source()?)
        .with_boxed_target(target)
        .with_interval(settings.polling_interval()?)
        .with_failure_limit(settings.failure_limit()?)
        .build()?;

    println!("✓ Watching {}:{}", settings.vault.host, settings.vault.path);
    println!("  Output: {}", output.display());
    println!("  Interval: {:?}", poller.interval());
    println!();

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        }
    });

    poller.run(shutdown).await?;

    match std::fs::read_to_string(&output) {
        Ok(contents) => println!("Last written contents:\n{contents}"),
        Err(_) => println!("No change was observed before shutdown."),
    }

    Ok(())
}
