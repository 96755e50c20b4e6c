use chrono::{DateTime, Utc};

use crate::snapshot::{PlaybackState, StatusSnapshot};

/// Current playback position in whole seconds, advanced from the last report.
///
/// Clock skew is not clamped: an anchor in the future yields a smaller (possibly
/// negative) position. The sum saturates instead of overflowing.
pub fn extrapolate(
    state: PlaybackState,
    position: i64,
    observed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    match state {
        PlaybackState::Off => 0,
        PlaybackState::Paused | PlaybackState::Idle => position,
        PlaybackState::Playing => match observed_at {
            Some(anchor) => {
                let elapsed_ms = (now - anchor).num_milliseconds();
                position.saturating_add(elapsed_ms.div_euclid(1_000))
            }
            None => position,
        },
    }
}

/// Shorthand for [`extrapolate`] over a snapshot.
pub fn current_position(snapshot: &StatusSnapshot, now: DateTime<Utc>) -> i64 {
    extrapolate(
        snapshot.playback_state,
        snapshot.playback_position,
        snapshot.position_observed_at,
        now,
    )
}

/// `MM:SS`; minutes keep counting past 59.
pub fn format_position(secs: i64) -> String {
    let sign = if secs < 0 { "-" } else { "" };
    let abs = secs.unsigned_abs();
    format!("{sign}{:02}:{:02}", abs / 60, abs % 60)
}
