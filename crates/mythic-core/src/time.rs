use std::time::Duration;

use chrono::{DateTime, Utc};

/// Minimum spacing between two recorded deaths of the same player.
pub const DEATH_COOLDOWN: Duration = Duration::from_secs(10);

/// Milliseconds since the Unix epoch, as carried in `ping`/`pong` payloads.
pub fn timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Whether `at` belongs to an earlier UTC calendar day than `now`.
///
/// Daily counters (conversions, deaths, map age) only count entries that are
/// not stale, so every such counter resets at UTC midnight.
pub fn is_stale(at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    at.date_naive() < now.date_naive()
}

/// Number of entries in a timestamp log recorded on the current UTC day.
pub fn fresh_count(log: &[DateTime<Utc>], now: DateTime<Utc>) -> usize {
    log.iter().filter(|&&at| !is_stale(at, now)).count()
}

/// Time left before another death may be recorded, or `None` when the
/// cooldown since `last_death` has elapsed.
pub fn death_cooldown_remaining(
    last_death: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let last = last_death?;
    let elapsed = now.signed_duration_since(last).to_std().unwrap_or_default();
    DEATH_COOLDOWN.checked_sub(elapsed).filter(|d| !d.is_zero())
}
