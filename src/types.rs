use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp layout used by meeting exports and by every report we write.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Half-open coverage span `[start, end)` with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    /// Returns `None` for empty or inverted spans.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn minutes(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 60_000.0
    }
}

/// One join/leave row of a meeting log, already validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub participant_key: String,
    pub display_name: String,
    pub email: String,
    pub interval: Interval,
    /// Minutes the export itself reports for this row.
    pub logged_minutes: f64,
}

/// Case-insensitive, whitespace-collapsed form of a display name.
pub fn participant_key(display_name: &str) -> String {
    display_name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub required_minutes: f64,
    /// Input file name this session is bound to; `None` applies to every file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl SessionWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, required_minutes: f64) -> Self {
        Self {
            start,
            end,
            required_minutes,
            file: None,
        }
    }

    pub fn applies_to(&self, file_name: &str) -> bool {
        self.file.as_deref().is_none_or(|f| f == file_name)
    }

    /// Label for the 1-based session `index`, as shown in report headers.
    pub fn label(&self, index: usize) -> String {
        format!("Session {index} ({})", self.start.format(TIMESTAMP_FORMAT))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Present,
    Absent,
}

impl PresenceStatus {
    pub fn code(self) -> &'static str {
        match self {
            PresenceStatus::Present => "P",
            PresenceStatus::Absent => "A",
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How a session entry came to exist on a participant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
    Evaluated,
    /// Synthesised because the participant had no coverage in the window.
    Backfilled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub status: PresenceStatus,
    pub in_window_minutes: f64,
    pub shortfall_minutes: f64,
    pub origin: ResultOrigin,
}

impl SessionResult {
    /// Result for a session with no in-window coverage. A zero requirement
    /// is still met.
    pub fn backfilled(required_minutes: f64) -> Self {
        let status = if required_minutes > 0.0 {
            PresenceStatus::Absent
        } else {
            PresenceStatus::Present
        };
        Self {
            status,
            in_window_minutes: 0.0,
            shortfall_minutes: required_minutes.max(0.0),
            origin: ResultOrigin::Backfilled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub participant_key: String,
    pub name: String,
    pub email: String,
    pub global_join: NaiveDateTime,
    pub global_leave: NaiveDateTime,
    pub total_duration_minutes: f64,
    /// Keyed by 1-based session index.
    pub sessions: BTreeMap<usize, SessionResult>,
    pub shortfall_reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub index: usize,
    pub present: usize,
    pub absent: usize,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session {}: Present: {}, Absent: {}",
            self.index, self.present, self.absent
        )
    }
}

/// Everything produced for one meeting log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReport {
    pub source: String,
    pub session_labels: Vec<String>,
    pub participants: Vec<ParticipantRecord>,
    pub summary: Vec<SessionSummary>,
    pub skipped_rows: usize,
}
