//! Key store snapshots and change detection.

use serde_json::Value;
use std::collections::HashMap;

/// A point-in-time view of the watched secret path.
///
/// Keys are unordered. Values are arbitrary JSON, compared by value.
pub type Snapshot = HashMap<String, Value>;

/// Returns true if both snapshots hold the same keys mapped to deeply-equal values.
///
/// Nested objects and arrays are compared recursively by value. Key order
/// never matters.
///
/// # Examples
///
/// ```rust
/// use vaultwatch::core::{Snapshot, snapshots_equal};
/// use serde_json::json;
///
/// let mut a = Snapshot::new();
/// a.insert("db_password".to_string(), json!("hunter2"));
/// let b = a.clone();
///
/// assert!(snapshots_equal(&a, &b));
/// ```
pub fn snapshots_equal(a: &Snapshot, b: &Snapshot) -> bool {
    a == b
}

/// Returns true if `new` differs from `old` in any key or value.
pub fn has_changed(old: &Snapshot, new: &Snapshot) -> bool {
    !snapshots_equal(old, new)
}

/// Key-level summary of what changed between two snapshots.
///
/// Only key names are kept; values are never copied so the diff is safe to log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Keys present only in the new snapshot
    pub added: Vec<String>,
    /// Keys present only in the old snapshot
    pub removed: Vec<String>,
    /// Keys present in both with different values
    pub modified: Vec<String>,
}

impl SnapshotDiff {
    /// Compute the key-level diff from `old` to `new`. Each list is sorted.
    pub fn between(old: &Snapshot, new: &Snapshot) -> Self {
        let mut diff = Self::default();

        for (key, value) in new {
            match old.get(key) {
                None => diff.added.push(key.clone()),
                Some(previous) if previous != value => diff.modified.push(key.clone()),
                Some(_) => {}
            }
        }
        diff.removed = old
            .keys()
            .filter(|key| !new.contains_key(*key))
            .cloned()
            .collect();

        diff.added.sort();
        diff.removed.sort();
        diff.modified.sort();
        diff
    }

    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}
