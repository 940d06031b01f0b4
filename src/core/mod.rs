//! Core change-detection types.

mod budget;
mod builder;
mod poller;
mod snapshot;

pub use budget::{FailureBudget, FailureLimit};
pub use builder::{DEFAULT_POLLING_INTERVAL, PollerBuilder};
pub use poller::{CycleOutcome, Phase, Poller};
pub use snapshot::{Snapshot, SnapshotDiff, has_changed, snapshots_equal};
