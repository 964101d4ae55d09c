use std::time::{Duration, Instant};

use pillbox_traits::Clock;

/// Sleep on `clock` until `due`, but for no longer than `timeout`.
/// Returns true once `due` has been reached.
pub fn sleep_until_or_timeout<C: Clock>(clock: &C, due: Instant, timeout: Duration) -> bool {
    let now = clock.now();
    if now >= due {
        return true;
    }
    let wait = due.saturating_duration_since(now);
    if wait > timeout {
        clock.sleep(timeout);
        return false;
    }
    clock.sleep(wait);
    true
}
