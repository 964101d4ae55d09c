//! Small time helpers shared by the runners and the CLI.

use std::time::Duration;

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
#[inline]
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
