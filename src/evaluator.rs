use crate::types::{PresenceStatus, ResultOrigin, SessionResult};
use crate::utils::round_to;

/// Classify in-window coverage against the required minutes.
///
/// Equality counts as present.
pub fn evaluate(in_window_minutes: f64, required_minutes: f64) -> SessionResult {
    if in_window_minutes >= required_minutes {
        SessionResult {
            status: PresenceStatus::Present,
            in_window_minutes,
            shortfall_minutes: 0.0,
            origin: ResultOrigin::Evaluated,
        }
    } else {
        SessionResult {
            status: PresenceStatus::Absent,
            in_window_minutes,
            shortfall_minutes: round_to(required_minutes - in_window_minutes, 2),
            origin: ResultOrigin::Evaluated,
        }
    }
}

/// Render fractional minutes as `"M minutes S seconds"`.
pub fn format_minutes(minutes: f64) -> String {
    let total_seconds = (minutes.max(0.0) * 60.0).round() as u64;
    format!(
        "{} minutes {} seconds",
        total_seconds / 60,
        total_seconds % 60
    )
}

pub fn shortfall_explanation(
    in_window_minutes: f64,
    required_minutes: f64,
    session_label: &str,
) -> String {
    format!(
        "User duration is just {} out of {}, which is why marking absent in {session_label}",
        format_minutes(in_window_minutes),
        format_minutes(required_minutes),
    )
}
