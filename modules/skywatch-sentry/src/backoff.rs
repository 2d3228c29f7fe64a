use chrono::{DateTime, Utc};

use skywatch_common::{TrackedThread, WatchConfig};

/// Outcome of a due-evaluation against a thread's backoff state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    /// Enough time elapsed at the current level — re-poll the thread.
    Check,
    /// The terminal silence window has run out; disable monitoring instead
    /// of checking again.
    Retire,
    NotDue,
}

/// Evaluate whether a thread is due for a check. Within the interval table
/// the boundary is inclusive: elapsed == interval is due. One past the table
/// the wait is measured in hours, and a due outcome means retire.
pub fn check_due(thread: &TrackedThread, config: &WatchConfig, now: DateTime<Utc>) -> DueStatus {
    let elapsed = now - thread.last_check_at;
    let level = thread.backoff_level.min(config.terminal_level()) as usize;

    match config.backoff_intervals_min.get(level) {
        Some(&interval_min) => {
            if elapsed.num_minutes() >= interval_min as i64 {
                DueStatus::Check
            } else {
                DueStatus::NotDue
            }
        }
        None => {
            if elapsed.num_hours() >= config.silence_window_hours {
                DueStatus::Retire
            } else {
                DueStatus::NotDue
            }
        }
    }
}

/// Apply the post-check transition. Activity resets the ratchet to level 0
/// and stamps both timestamps; silence advances one level, saturating at the
/// terminal index, and leaves `last_new_activity_at` alone.
pub fn record_check(
    thread: &mut TrackedThread,
    activity_found: bool,
    terminal_level: u32,
    now: DateTime<Utc>,
) {
    if activity_found {
        thread.backoff_level = 0;
        thread.last_new_activity_at = Some(now);
    } else {
        thread.backoff_level = (thread.backoff_level + 1).min(terminal_level);
    }
    thread.last_check_at = now;
}

/// Current polling interval in milliseconds, for the monitoring-job schedule.
pub fn interval_ms(backoff_level: u32, config: &WatchConfig) -> u64 {
    match config.backoff_intervals_min.get(backoff_level as usize) {
        Some(&minutes) => minutes as u64 * 60_000,
        None => config.silence_window_hours as u64 * 3_600_000,
    }
}
