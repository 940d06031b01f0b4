//! Builder for constructing Poller instances.

use crate::core::{FailureBudget, FailureLimit, Poller};
use crate::error::{Result, WatchError};
use crate::sources::SnapshotSource;
use crate::targets::Target;
use std::time::Duration;

/// Default time between poll cycles.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);

/// Builder for constructing a [`Poller`].
///
/// A source and a target are required. The interval defaults to
/// [`DEFAULT_POLLING_INTERVAL`] and the failure limit to 3.
///
/// # Examples
///
/// ```rust,no_run
/// use vaultwatch::prelude::*;
/// use vaultwatch::sources::VaultSource;
/// use vaultwatch::targets::CommandTarget;
///
/// # fn example() -> Result<()> {
/// let poller = Poller::builder()
///     .with_source(VaultSource::builder().with_host("vault").with_path("app").build()?)
///     .with_target(CommandTarget::new("systemctl reload app"))
///     .with_failure_limit(FailureLimit::Unlimited)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct PollerBuilder {
    source: Option<Box<dyn SnapshotSource>>,
    target: Option<Box<dyn Target>>,
    interval: Duration,
    failure_limit: FailureLimit,
}

impl PollerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            source: None,
            target: None,
            interval: DEFAULT_POLLING_INTERVAL,
            failure_limit: FailureLimit::default(),
        }
    }

    /// Set the store snapshots are fetched from.
    pub fn with_source<S: SnapshotSource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Set the action run on each detected change.
    pub fn with_target<T: Target + 'static>(mut self, target: T) -> Self {
        self.target = Some(Box::new(target));
        self
    }

    /// Set an already-boxed target, as returned by
    /// [`build_target`](crate::targets::build_target).
    pub fn with_boxed_target(mut self, target: Box<dyn Target>) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the time between poll cycles.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set how many consecutive failures are tolerated.
    pub fn with_failure_limit(mut self, limit: FailureLimit) -> Self {
        self.failure_limit = limit;
        self
    }

    /// Build the poller.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No source or target was provided
    /// - The interval is zero
    pub fn build(self) -> Result<Poller> {
        let source = self
            .source
            .ok_or_else(|| WatchError::Config("a snapshot source is required".to_string()))?;
        let target = self
            .target
            .ok_or_else(|| WatchError::Config("a target is required".to_string()))?;

        if self.interval.is_zero() {
            return Err(WatchError::Config(
                "polling interval must be greater than zero".to_string(),
            ));
        }

        Ok(Poller::new(
            source,
            target,
            self.interval,
            FailureBudget::new(self.failure_limit),
        ))
    }
}

impl Default for PollerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Snapshot;
    use crate::targets::{FileFormat, FileTarget};
    use async_trait::async_trait;

    struct EmptySource;

    #[async_trait]
    impl SnapshotSource for EmptySource {
        async fn fetch(&self) -> Result<Snapshot> {
            Ok(Snapshot::new())
        }

        fn name(&self) -> String {
            "empty".to_string()
        }
    }

    #[test]
    fn test_defaults() {
        let poller = PollerBuilder::new()
            .with_source(EmptySource)
            .with_target(FileTarget::new("out.json", FileFormat::Json))
            .build()
            .unwrap();

        assert_eq!(poller.interval(), DEFAULT_POLLING_INTERVAL);
        assert_eq!(poller.budget().limit(), FailureLimit::Limited(3));
        assert_eq!(poller.budget().remaining(), Some(3));
        assert!(poller.held_snapshot().is_empty());
    }

    #[test]
    fn test_requires_source_and_target() {
        let missing_target = PollerBuilder::new().with_source(EmptySource).build();
        assert!(missing_target.is_err());

        let missing_source = PollerBuilder::new()
            .with_target(FileTarget::new("out.json", FileFormat::Json))
            .build();
        assert!(missing_source.is_err());
    }

    #[test]
    fn test_rejects_zero_interval() {
        let result = PollerBuilder::new()
            .with_source(EmptySource)
            .with_target(FileTarget::new("out.json", FileFormat::Json))
            .with_interval(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(WatchError::Config(_))));
    }
}
