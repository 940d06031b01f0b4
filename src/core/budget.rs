//! Consecutive-failure budget shared by the fetch and dispatch phases.

use crate::error::{Result, WatchError};
use std::fmt;

/// How many consecutive failures the poller tolerates before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureLimit {
    /// Tolerate exactly this many consecutive failures; the next one is fatal.
    Limited(u32),
    /// Never terminate because of failures.
    Unlimited,
}

impl FailureLimit {
    /// Convert a raw command-line value. `-1` means unlimited.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for any other negative value, or a value
    /// that does not fit in a `u32`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vaultwatch::core::FailureLimit;
    ///
    /// assert_eq!(FailureLimit::from_raw(3).unwrap(), FailureLimit::Limited(3));
    /// assert_eq!(FailureLimit::from_raw(-1).unwrap(), FailureLimit::Unlimited);
    /// assert!(FailureLimit::from_raw(-2).is_err());
    /// ```
    pub fn from_raw(raw: i64) -> Result<Self> {
        match raw {
            -1 => Ok(Self::Unlimited),
            n if n < 0 => Err(WatchError::Config(format!(
                "failure limit must be >= 0, or -1 for no limit (got {})",
                n
            ))),
            n => u32::try_from(n).map(Self::Limited).map_err(|_| {
                WatchError::Config(format!("failure limit {} is too large", n))
            }),
        }
    }
}

impl Default for FailureLimit {
    fn default() -> Self {
        Self::Limited(3)
    }
}

impl fmt::Display for FailureLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{}", n),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Counter of consecutive failures against a [`FailureLimit`].
///
/// Any fully successful cycle resets the budget. The policy tolerates exactly
/// `limit` failures in a row; the `limit + 1`-th is fatal.
#[derive(Debug, Clone)]
pub struct FailureBudget {
    limit: FailureLimit,
    remaining: u32,
}

impl FailureBudget {
    /// Create a budget with the full allowance available.
    pub fn new(limit: FailureLimit) -> Self {
        let remaining = match limit {
            FailureLimit::Limited(n) => n,
            FailureLimit::Unlimited => 0,
        };
        Self { limit, remaining }
    }

    /// Record a failed cycle.
    ///
    /// Returns `true` if the allowance was already used up by earlier failures,
    /// meaning this failure must terminate the loop.
    pub fn record_failure(&mut self) -> bool {
        match self.limit {
            FailureLimit::Unlimited => false,
            FailureLimit::Limited(_) => {
                if self.remaining == 0 {
                    return true;
                }
                self.remaining -= 1;
                false
            }
        }
    }

    /// Record a successful cycle, restoring the full allowance.
    pub fn record_success(&mut self) {
        if let FailureLimit::Limited(n) = self.limit {
            self.remaining = n;
        }
    }

    /// Failures still tolerated before the next one is fatal. `None` if unlimited.
    pub fn remaining(&self) -> Option<u32> {
        match self.limit {
            FailureLimit::Limited(_) => Some(self.remaining),
            FailureLimit::Unlimited => None,
        }
    }

    /// The configured limit.
    pub fn limit(&self) -> FailureLimit {
        self.limit
    }
}
