//! The change-detection poll loop.

use crate::core::builder::PollerBuilder;
use crate::core::{FailureBudget, Snapshot, SnapshotDiff, snapshots_equal};
use crate::error::{Result, WatchError};
use crate::sources::SnapshotSource;
use crate::targets::Target;
use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Which part of a cycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading the snapshot from the store.
    Fetch,
    /// Running the target on a detected change.
    Dispatch,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::Dispatch => f.write_str("dispatch"),
        }
    }
}

/// Result of one non-fatal poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The fetched snapshot matched the held one; the target was not run.
    Unchanged,
    /// A change was dispatched and the held snapshot advanced.
    Dispatched,
    /// A failure was absorbed by the budget.
    Recovered {
        /// Where the failure happened
        phase: Phase,
        /// Failures still tolerated, `None` if unlimited
        remaining: Option<u32>,
    },
}

/// Periodically fetches a snapshot, compares it with the last dispatched one,
/// and runs the target when they differ.
///
/// Cycles are strictly serialized: a fetch, compare, and dispatch always run
/// to completion before the next tick or a shutdown request is considered.
/// The held snapshot starts empty and only advances after a successful
/// dispatch, so a failed dispatch is retried against the same old snapshot
/// and the newest fetched state.
///
/// # Examples
///
/// ```rust,no_run
/// use vaultwatch::prelude::*;
/// use vaultwatch::sources::VaultSource;
/// use vaultwatch::targets::{FileFormat, FileTarget};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<()> {
/// let source = VaultSource::builder()
///     .with_host("127.0.0.1")
///     .with_path("app")
///     .with_token("s.xxxxx")
///     .build()?;
///
/// let mut poller = Poller::builder()
///     .with_source(source)
///     .with_target(FileTarget::new("/run/app.env", FileFormat::Env))
///     .with_interval(Duration::from_secs(5))
///     .with_failure_limit(FailureLimit::Limited(3))
///     .build()?;
///
/// poller.run(CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
pub struct Poller {
    source: Box<dyn SnapshotSource>,
    target: Box<dyn Target>,
    interval: Duration,
    budget: FailureBudget,
    held: Snapshot,
}

impl Poller {
    /// Create a new builder for constructing a poller.
    pub fn builder() -> PollerBuilder {
        PollerBuilder::new()
    }

    pub(crate) fn new(
        source: Box<dyn SnapshotSource>,
        target: Box<dyn Target>,
        interval: Duration,
        budget: FailureBudget,
    ) -> Self {
        Self {
            source,
            target,
            interval,
            budget,
            held: Snapshot::new(),
        }
    }

    /// The last successfully dispatched snapshot (empty before the first one).
    pub fn held_snapshot(&self) -> &Snapshot {
        &self.held
    }

    /// The failure budget in its current state.
    pub fn budget(&self) -> &FailureBudget {
        &self.budget
    }

    /// Time between cycles.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run exactly one fetch, compare, and (on change) dispatch.
    ///
    /// # Errors
    ///
    /// Returns the phase-wrapped failure once the budget is exhausted. Any
    /// failure the budget still tolerates is reported as
    /// [`CycleOutcome::Recovered`] instead.
    pub async fn poll_once(&mut self) -> Result<CycleOutcome> {
        let new = match self.source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let err = WatchError::Fetch {
                    source_name: self.source.name(),
                    source: Box::new(err),
                };
                return self.absorb_failure(Phase::Fetch, err);
            }
        };

        if snapshots_equal(&self.held, &new) {
            self.budget.record_success();
            return Ok(CycleOutcome::Unchanged);
        }

        let diff = SnapshotDiff::between(&self.held, &new);
        debug!(
            added = ?diff.added,
            removed = ?diff.removed,
            modified = ?diff.modified,
            target = %self.target.kind(),
            "change observed between the old and new key store, executing the target"
        );

        match self.target.execute(&self.held, &new).await {
            Ok(()) => {
                self.budget.record_success();
                self.held = new;
                Ok(CycleOutcome::Dispatched)
            }
            Err(err) => {
                let err = WatchError::Dispatch {
                    kind: self.target.kind(),
                    target: self.target.describe(),
                    source: Box::new(err),
                };
                self.absorb_failure(Phase::Dispatch, err)
            }
        }
    }

    fn absorb_failure(&mut self, phase: Phase, err: WatchError) -> Result<CycleOutcome> {
        if self.budget.record_failure() {
            warn!(%phase, limit = %self.budget.limit(), "failure limit reached, exiting!");
            return Err(err);
        }

        let remaining = self.budget.remaining();
        warn!(%phase, remaining = ?remaining, error = %err, "poll cycle failed, will retry");
        Ok(CycleOutcome::Recovered { phase, remaining })
    }

    /// Poll every interval until `shutdown` is cancelled or the budget runs out.
    ///
    /// The first cycle starts one interval after the call. If a tick and a
    /// shutdown request are ready together, shutdown wins. Shutdown never
    /// interrupts a cycle already in progress.
    ///
    /// # Errors
    ///
    /// Returns the failure that exhausted the budget. Shutdown returns `Ok(())`
    /// regardless of the budget state.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            source = %self.source.name(),
            target = %self.target.kind(),
            interval = ?self.interval,
            failure_limit = %self.budget.limit(),
            "starting the poller"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping the poller");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let outcome = self.poll_once().await?;
                    debug!(?outcome, "poll cycle finished");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureLimit;
    use crate::targets::TargetKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Plays back a script of fetch results; `None` is a failure. The last
    /// entry repeats forever.
    struct ScriptedSource {
        script: Vec<Option<Snapshot>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn fetch(&self) -> Result<Snapshot> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let index = call.min(self.script.len() - 1);
            self.script[index]
                .clone()
                .ok_or_else(|| WatchError::Store("vault unreachable".to_string()))
        }

        fn name(&self) -> String {
            "scripted:secret/app".to_string()
        }
    }

    /// Records every invocation; fails on call indexes listed in `fail_on`.
    struct RecordingTarget {
        fail_on: Vec<usize>,
        calls: Arc<Mutex<Vec<(Snapshot, Snapshot)>>>,
    }

    #[async_trait]
    impl Target for RecordingTarget {
        async fn execute(&self, old: &Snapshot, new: &Snapshot) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len();
            calls.push((old.clone(), new.clone()));
            if self.fail_on.contains(&index) {
                return Err(WatchError::Target("hook returned 500".to_string()));
            }
            Ok(())
        }

        fn kind(&self) -> TargetKind {
            TargetKind::Webhook
        }

        fn describe(&self) -> String {
            "http://hooks.test/vault".to_string()
        }
    }

    /// Requests shutdown from inside `fetch`, then keeps the cycle busy.
    struct CancellingSource {
        shutdown: CancellationToken,
        snapshot: Snapshot,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SnapshotSource for CancellingSource {
        async fn fetch(&self) -> Result<Snapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.shutdown.cancel();
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(self.snapshot.clone())
        }

        fn name(&self) -> String {
            "cancelling:secret/app".to_string()
        }
    }

    struct Harness {
        poller: Poller,
        fetches: Arc<AtomicUsize>,
        dispatches: Arc<Mutex<Vec<(Snapshot, Snapshot)>>>,
    }

    fn harness(script: Vec<Option<Snapshot>>, fail_on: Vec<usize>, limit: FailureLimit) -> Harness {
        let fetches = Arc::new(AtomicUsize::new(0));
        let dispatches = Arc::new(Mutex::new(Vec::new()));
        let poller = Poller::builder()
            .with_source(ScriptedSource {
                script,
                calls: Arc::clone(&fetches),
            })
            .with_target(RecordingTarget {
                fail_on,
                calls: Arc::clone(&dispatches),
            })
            .with_interval(Duration::from_secs(5))
            .with_failure_limit(limit)
            .build()
            .unwrap();

        Harness {
            poller,
            fetches,
            dispatches,
        }
    }

    fn snap(value: serde_json::Value) -> Snapshot {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_first_change_dispatches_against_empty() {
        let new = snap(json!({"foo": "bar"}));
        let mut h = harness(vec![Some(new.clone())], vec![], FailureLimit::Limited(3));

        assert_eq!(h.poller.poll_once().await.unwrap(), CycleOutcome::Dispatched);
        assert_eq!(h.poller.held_snapshot(), &new);

        let dispatches = h.dispatches.lock().unwrap();
        assert_eq!(dispatches.len(), 1);
        assert!(dispatches[0].0.is_empty());
        assert_eq!(dispatches[0].1, new);
    }

    #[tokio::test]
    async fn test_empty_first_fetch_is_unchanged() {
        let mut h = harness(vec![Some(Snapshot::new())], vec![], FailureLimit::Limited(3));

        assert_eq!(h.poller.poll_once().await.unwrap(), CycleOutcome::Unchanged);
        assert!(h.dispatches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_cycles_never_dispatch_and_reset_budget() {
        let v1 = snap(json!({"foo": "bar"}));
        let mut h = harness(
            vec![Some(v1.clone()), None, None, Some(v1.clone())],
            vec![],
            FailureLimit::Limited(2),
        );

        assert_eq!(h.poller.poll_once().await.unwrap(), CycleOutcome::Dispatched);
        h.poller.poll_once().await.unwrap();
        h.poller.poll_once().await.unwrap();
        assert_eq!(h.poller.budget().remaining(), Some(0));

        assert_eq!(h.poller.poll_once().await.unwrap(), CycleOutcome::Unchanged);
        assert_eq!(h.poller.budget().remaining(), Some(2));
        assert_eq!(h.dispatches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failures_tolerated_up_to_limit() {
        let mut h = harness(vec![None], vec![], FailureLimit::Limited(3));

        for expected in [2, 1, 0] {
            assert_eq!(
                h.poller.poll_once().await.unwrap(),
                CycleOutcome::Recovered {
                    phase: Phase::Fetch,
                    remaining: Some(expected)
                }
            );
        }

        let err = h.poller.poll_once().await.unwrap_err();
        assert!(matches!(err, WatchError::Fetch { .. }));
        assert!(err.to_string().contains("scripted:secret/app"));
        assert!(err.to_string().contains("vault unreachable"));
    }

    #[tokio::test]
    async fn test_failed_dispatch_keeps_old_snapshot() {
        let v1 = snap(json!({"foo": "bar"}));
        let v2 = snap(json!({"foo": "bar", "a": "b"}));
        let mut h = harness(
            vec![Some(v1.clone()), Some(v2.clone())],
            vec![1],
            FailureLimit::Limited(3),
        );

        assert_eq!(h.poller.poll_once().await.unwrap(), CycleOutcome::Dispatched);
        assert_eq!(
            h.poller.poll_once().await.unwrap(),
            CycleOutcome::Recovered {
                phase: Phase::Dispatch,
                remaining: Some(2)
            }
        );
        assert_eq!(h.poller.held_snapshot(), &v1);

        // Retry diffs against the same old snapshot and succeeds.
        assert_eq!(h.poller.poll_once().await.unwrap(), CycleOutcome::Dispatched);
        assert_eq!(h.poller.held_snapshot(), &v2);
        assert_eq!(h.poller.budget().remaining(), Some(3));

        let dispatches = h.dispatches.lock().unwrap();
        assert_eq!(dispatches.len(), 3);
        assert_eq!(dispatches[1], (v1.clone(), v2.clone()));
        assert_eq!(dispatches[2], (v1, v2));
    }

    #[tokio::test]
    async fn test_retry_uses_latest_fetched_state() {
        let v1 = snap(json!({"k": 1}));
        let v2 = snap(json!({"k": 2}));
        let v3 = snap(json!({"k": 3}));
        let mut h = harness(
            vec![Some(v1.clone()), Some(v2), Some(v3.clone())],
            vec![1],
            FailureLimit::Limited(1),
        );

        h.poller.poll_once().await.unwrap();
        h.poller.poll_once().await.unwrap();
        assert_eq!(h.poller.poll_once().await.unwrap(), CycleOutcome::Dispatched);

        let dispatches = h.dispatches.lock().unwrap();
        assert_eq!(dispatches.last().unwrap(), &(v1, v3));
    }

    #[tokio::test]
    async fn test_dispatch_failure_wrapped_with_target_context() {
        let mut h = harness(
            vec![Some(snap(json!({"foo": "bar"})))],
            vec![0],
            FailureLimit::Limited(0),
        );

        let err = h.poller.poll_once().await.unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, WatchError::Dispatch { kind: TargetKind::Webhook, .. }));
        assert!(text.contains("http://hooks.test/vault"));
        assert!(text.contains("hook returned 500"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_after_limit_plus_one_failures() {
        let mut h = harness(vec![None], vec![], FailureLimit::Limited(3));

        let result = h.poller.run(CancellationToken::new()).await;

        assert!(matches!(result, Err(WatchError::Fetch { .. })));
        assert_eq!(h.fetches.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_one_interval_before_first_fetch() {
        let h = harness(vec![Some(Snapshot::new())], vec![], FailureLimit::Limited(3));
        let fetches = Arc::clone(&h.fetches);
        let token = CancellationToken::new();

        let mut poller = h.poller;
        let handle = tokio::spawn({
            let token = token.clone();
            async move { poller.run(token).await }
        });

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        token.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_budget_survives_until_shutdown() {
        let h = harness(vec![None], vec![], FailureLimit::Unlimited);
        let fetches = Arc::clone(&h.fetches);
        let token = CancellationToken::new();

        let mut poller = h.poller;
        let handle = tokio::spawn({
            let token = token.clone();
            async move { poller.run(token).await }
        });

        tokio::time::sleep(Duration::from_secs(5 * 50 + 1)).await;
        token.cancel();

        assert!(handle.await.unwrap().is_ok());
        assert!(fetches.load(Ordering::SeqCst) >= 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_with_exhausted_budget_is_ok() {
        let h = harness(vec![None], vec![], FailureLimit::Limited(1));
        let fetches = Arc::clone(&h.fetches);
        let token = CancellationToken::new();

        let mut poller = h.poller;
        let handle = tokio::spawn({
            let token = token.clone();
            async move { poller.run(token).await }
        });

        // One failure absorbed at t=5s; the next would be fatal at t=10s.
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        token.cancel();

        assert!(handle.await.unwrap().is_ok());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_stops_before_any_cycle() {
        let mut h = harness(vec![Some(snap(json!({"a": 1})))], vec![], FailureLimit::Limited(3));
        let token = CancellationToken::new();
        token.cancel();

        assert!(h.poller.run(token).await.is_ok());
        assert_eq!(h.fetches.load(Ordering::SeqCst), 0);
        assert!(h.dispatches.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_cycle_lets_it_finish() {
        let token = CancellationToken::new();
        let fetches = Arc::new(AtomicUsize::new(0));
        let dispatches = Arc::new(Mutex::new(Vec::new()));
        let new = snap(json!({"foo": "bar"}));

        let mut poller = Poller::builder()
            .with_source(CancellingSource {
                shutdown: token.clone(),
                snapshot: new.clone(),
                calls: Arc::clone(&fetches),
            })
            .with_target(RecordingTarget {
                fail_on: vec![],
                calls: Arc::clone(&dispatches),
            })
            .with_interval(Duration::from_secs(5))
            .build()
            .unwrap();

        assert!(poller.run(token).await.is_ok());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(dispatches.lock().unwrap().len(), 1);
        assert_eq!(poller.held_snapshot(), &new);
    }
}
