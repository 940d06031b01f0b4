//! Snapshot source implementations.

mod snapshot_source;
mod vault;

pub use snapshot_source::SnapshotSource;
pub use vault::{VaultSource, VaultSourceBuilder};
