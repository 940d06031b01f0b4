//! Actions triggered when the watched key store changes.

mod command;
mod file;
mod target;
mod webhook;

pub use command::{CommandTarget, DEFAULT_INTERMEDIATE_FILE};
pub use file::{FileFormat, FileTarget};
pub use target::{Target, TargetKind};
pub use webhook::{WEBHOOK_TIMEOUT, WebhookTarget};

use crate::error::{Result, WatchError};
use crate::settings::TargetSettings;

/// Construct the target selected by `kind` from its own settings block.
///
/// This is the only place target variants are looked up; the result is
/// handed to the poller once and never swapped.
///
/// # Errors
///
/// Returns a configuration error if a required field for the chosen variant
/// is missing or malformed.
pub fn build_target(kind: TargetKind, settings: &TargetSettings) -> Result<Box<dyn Target>> {
    match kind {
        TargetKind::File => {
            let file = &settings.file;
            if file.path.is_empty() {
                return Err(WatchError::Config(
                    "file target requires a destination path".to_string(),
                ));
            }
            let format: FileFormat = file.format.parse()?;
            Ok(Box::new(FileTarget::new(&file.path, format)))
        }
        TargetKind::Command => {
            let command = &settings.command;
            if command.command.trim().is_empty() {
                return Err(WatchError::Config(
                    "command target requires a command to run".to_string(),
                ));
            }
            let mut target = CommandTarget::new(&command.command);
            if !command.intermediate_file.is_empty() {
                target = target.with_intermediate_file(&command.intermediate_file);
            }
            Ok(Box::new(target))
        }
        TargetKind::Webhook => {
            let webhook = &settings.webhook;
            if webhook.url.is_empty() {
                return Err(WatchError::Config(
                    "webhook target requires a URL".to_string(),
                ));
            }
            let target = WebhookTarget::new(&webhook.url)?.with_bearer_token(&webhook.access_token);
            Ok(Box::new(target))
        }
    }
}
