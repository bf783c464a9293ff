//! Unix-nanosecond clock helper
//!
//! All timestamps in the system are i64 Unix nanoseconds.

use std::time::{SystemTime, UNIX_EPOCH};

pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Current wall-clock time in Unix nanoseconds
pub fn unix_nanos_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
