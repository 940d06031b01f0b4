//! Snapshot source trait.

use crate::core::Snapshot;
use crate::error::Result;
use async_trait::async_trait;

/// Trait for stores the poller can read snapshots from.
///
/// Implement this trait to watch something other than Vault. Each call to
/// [`fetch`](SnapshotSource::fetch) must return a fresh snapshot; the poller
/// owns the result and compares it against the last dispatched one.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Read the current contents of the watched path.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable, rejects the credentials,
    /// or answers with something that is not a key-value object.
    async fn fetch(&self) -> Result<Snapshot>;

    /// Human-readable name for this source, used in logs and error context.
    fn name(&self) -> String;
}
