//! # vaultwatch
//!
//! Watch a secret in a Vault KV store and react whenever its contents change.
//!
//! ## Overview
//!
//! A [`Poller`](core::Poller) fetches a snapshot of the watched path on a fixed
//! interval, compares it with the last snapshot it successfully dispatched, and
//! on any difference hands both snapshots to a single [`Target`](targets::Target):
//! - **file**: write the new snapshot as JSON or `KEY=value` lines
//! - **command**: stage both snapshots in a JSON file, then run a shell command
//! - **webhook**: POST both snapshots to a URL
//!
//! Fetch and dispatch failures share one consecutive-failure budget. Once it is
//! exhausted the loop stops and returns the failure that ended it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vaultwatch::prelude::*;
//! use vaultwatch::sources::VaultSource;
//! use vaultwatch::targets::WebhookTarget;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<()> {
//! let mut poller = Poller::builder()
//!     .with_source(
//!         VaultSource::builder()
//!             .with_host("127.0.0.1")
//!             .with_path("app/database")
//!             .with_token("s.xxxxx")
//!             .build()?,
//!     )
//!     .with_target(WebhookTarget::new("https://hooks.example.com/vault")?)
//!     .build()?;
//!
//! let shutdown = CancellationToken::new();
//! poller.run(shutdown).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod duration;
pub mod error;
pub mod settings;
pub mod sources;
pub mod targets;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{CycleOutcome, FailureLimit, Poller, PollerBuilder, Snapshot};
    pub use crate::error::{Result, WatchError};
    pub use crate::settings::Settings;
    pub use crate::sources::SnapshotSource;
    pub use crate::targets::{Target, TargetKind, build_target};
}
