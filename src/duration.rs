//! Parsing for human-friendly durations such as `5s`, `500ms`, or `1.5m`.

use crate::error::{Result, WatchError};
use std::time::Duration;

/// Suffix to nanoseconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("µs", 1_000.0),
    ("us", 1_000.0),
    ("ms", 1_000_000.0),
    ("s", 1_000_000_000.0),
    ("m", 60_000_000_000.0),
    ("h", 3_600_000_000_000.0),
];

/// Parse duration strings like "5s", "250ms", "1.5m", "2h".
///
/// # Errors
///
/// Returns a configuration error for a missing or unknown unit, a value that
/// is not a number, or a negative value.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            let val: f64 = val_str
                .trim()
                .parse()
                .map_err(|_| WatchError::Config(format!("Invalid duration: {}", s)))?;
            if !val.is_finite() || val < 0.0 {
                return Err(WatchError::Config(format!("Invalid duration: {}", s)));
            }
            return Ok(Duration::from_nanos((val * multiplier) as u64));
        }
    }

    Err(WatchError::Config(format!(
        "Unknown duration format: {} (expected a unit such as ms, s, m, h)",
        s
    )))
}
