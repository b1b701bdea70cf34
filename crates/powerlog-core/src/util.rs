//! Small helpers shared by the binaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Granularity at which [`sleep_while_running`] checks for shutdown.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Parses a non-negative number of seconds (fractions allowed) into a
/// `Duration`.
///
/// Rejects negative, non-finite and out-of-range values, so callers never
/// convert an invalid float later on.
pub fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid number of seconds '{}': {}", s, e))?;
    if secs.is_nan() || secs < 0.0 {
        return Err(format!("seconds must be a non-negative number, got '{}'", s));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| format!("'{}' seconds is out of range", s))
}

/// Sleeps for `duration`, waking every 100 ms to check `running`.
///
/// Returns early once `running` is cleared.
pub fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let mut remaining = duration;
    while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
        let sleep_time = remaining.min(SLEEP_SLICE);
        std::thread::sleep(sleep_time);
        remaining = remaining.saturating_sub(sleep_time);
    }
}
