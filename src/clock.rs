//! Wall-clock helper shared by presence timestamps and latency probes.

#[cfg(test)]
#[path = "clock_test.rs"]
mod clock_test;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. Clocks set before 1970 read as `0`.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, duration_ms)
}

/// Whole milliseconds in `d`, saturating at `i64::MAX`.
#[must_use]
pub fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
