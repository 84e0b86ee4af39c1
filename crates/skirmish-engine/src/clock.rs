//! Converting monotonic deadlines to wall-clock milliseconds for the wire.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Unix milliseconds right now.
pub fn unix_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Unix milliseconds of the monotonic instant `at`, given that the
/// monotonic clock currently reads `now`.
pub fn unix_millis_at(at: Instant, now: Instant) -> u64 {
    let wall = unix_millis_now();
    if at >= now {
        wall.saturating_add((at - now).as_millis() as u64)
    } else {
        wall.saturating_sub((now - at).as_millis() as u64)
    }
}
