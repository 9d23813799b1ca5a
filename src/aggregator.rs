//! Presence aggregation over one meeting log and any number of sessions.
//!
//! The log is grouped once into per-participant coverage. Each session is
//! then evaluated independently against that shared, immutable table, so no
//! session can observe another's intermediate state. Per-session results are
//! folded into participant records, gaps are backfilled as absences, and the
//! total logged duration is taken from the whole unwindowed log.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::error::{AttendanceError, Result};
use crate::evaluator::{evaluate, shortfall_explanation};
use crate::intervals::{clip_to_window, merge_intervals, total_minutes};
use crate::log_reader::ParsedLog;
use crate::types::{
    AttendanceReport, Interval, ParticipantRecord, PresenceStatus, SessionResult, SessionSummary,
    SessionWindow,
};

/// Everything the log says about one participant, independent of sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantLog {
    /// Name and email of the first row seen for this participant.
    pub name: String,
    pub email: String,
    pub coverage: Vec<Interval>,
    pub global_join: NaiveDateTime,
    pub global_leave: NaiveDateTime,
    pub logged_minutes: f64,
}

/// Group valid events by participant key and merge their coverage.
pub fn group_participants(log: &ParsedLog) -> BTreeMap<String, ParticipantLog> {
    let mut raw: BTreeMap<String, (ParticipantLog, Vec<Interval>)> = BTreeMap::new();

    for event in &log.events {
        let (entry, spans) = raw
            .entry(event.participant_key.clone())
            .or_insert_with(|| {
                (
                    ParticipantLog {
                        name: event.display_name.clone(),
                        email: event.email.clone(),
                        coverage: Vec::new(),
                        global_join: event.interval.start,
                        global_leave: event.interval.end,
                        logged_minutes: 0.0,
                    },
                    Vec::new(),
                )
            });

        // The span is a plain min/max over raw rows, not over merged coverage.
        entry.global_join = entry.global_join.min(event.interval.start);
        entry.global_leave = entry.global_leave.max(event.interval.end);
        entry.logged_minutes += event.logged_minutes;
        spans.push(event.interval);
    }

    raw.into_iter()
        .map(|(key, (mut participant, spans))| {
            participant.coverage = merge_intervals(spans);
            (key, participant)
        })
        .collect()
}

/// Evaluate one session window. Participants without any in-window
/// coverage are left out; they are backfilled later.
pub fn evaluate_session(
    participants: &BTreeMap<String, ParticipantLog>,
    window: &SessionWindow,
) -> BTreeMap<String, SessionResult> {
    participants
        .iter()
        .filter_map(|(key, participant)| {
            let in_window = clip_to_window(&participant.coverage, window);
            if in_window.is_empty() {
                return None;
            }
            Some((
                key.clone(),
                evaluate(total_minutes(&in_window), window.required_minutes),
            ))
        })
        .collect()
}

/// Produce the attendance report for one log.
///
/// Sessions must already be validated (see `sessions::validate_sessions`);
/// an empty session list fails the whole log.
pub fn aggregate(log: &ParsedLog, sessions: &[SessionWindow]) -> Result<AttendanceReport> {
    if sessions.is_empty() {
        return Err(AttendanceError::NoSessions {
            file: log.source.clone(),
        });
    }

    let participants = group_participants(log);
    let labels: Vec<String> = sessions
        .iter()
        .enumerate()
        .map(|(idx, s)| s.label(idx + 1))
        .collect();

    let mut records: BTreeMap<String, ParticipantRecord> = BTreeMap::new();

    for (idx, window) in sessions.iter().enumerate() {
        let index = idx + 1;
        for (key, result) in evaluate_session(&participants, window) {
            let Some(participant) = participants.get(&key) else {
                continue;
            };
            records
                .entry(key.clone())
                .or_insert_with(|| new_record(&key, participant))
                .sessions
                .insert(index, result);
        }
    }

    // Participants that never overlapped any window still get a row.
    for (key, participant) in &participants {
        records
            .entry(key.clone())
            .or_insert_with(|| new_record(key, participant));
    }

    for (key, record) in records.iter_mut() {
        for (idx, window) in sessions.iter().enumerate() {
            record
                .sessions
                .entry(idx + 1)
                .or_insert_with(|| SessionResult::backfilled(window.required_minutes));
        }

        if let Some(participant) = participants.get(key) {
            record.total_duration_minutes = participant.logged_minutes;
        }

        record.shortfall_reason = record
            .sessions
            .iter()
            .filter(|(_, r)| r.status == PresenceStatus::Absent)
            .map(|(index, r)| {
                shortfall_explanation(
                    r.in_window_minutes,
                    sessions[index - 1].required_minutes,
                    &labels[index - 1],
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
    }

    let summary = summarize(&records, sessions.len());
    tracing::info!(
        source = %log.source,
        participants = records.len(),
        sessions = sessions.len(),
        skipped_rows = log.skipped.len(),
        "aggregated attendance"
    );

    Ok(AttendanceReport {
        source: log.source.clone(),
        session_labels: labels,
        participants: records.into_values().collect(),
        summary,
        skipped_rows: log.skipped.len(),
    })
}

fn new_record(key: &str, participant: &ParticipantLog) -> ParticipantRecord {
    ParticipantRecord {
        participant_key: key.to_string(),
        name: participant.name.clone(),
        email: participant.email.clone(),
        global_join: participant.global_join,
        global_leave: participant.global_leave,
        total_duration_minutes: 0.0,
        sessions: BTreeMap::new(),
        shortfall_reason: String::new(),
    }
}

fn summarize(
    records: &BTreeMap<String, ParticipantRecord>,
    session_count: usize,
) -> Vec<SessionSummary> {
    (1..=session_count)
        .map(|index| {
            let present = records
                .values()
                .filter(|r| {
                    r.sessions.get(&index).map(|s| s.status) == Some(PresenceStatus::Present)
                })
                .count();
            SessionSummary {
                index,
                present,
                absent: records.len() - present,
            }
        })
        .collect()
}
