//! Loading of meeting attendance exports.
//!
//! Exports start with a fixed block of meeting metadata lines, followed by
//! the participant header and one row per join/leave pair. Header names vary
//! between export versions, so each logical column is resolved once against
//! an ordered alias list into a [`LogSchema`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AttendanceError, Result};
use crate::types::{AttendanceEvent, Interval, participant_key};
use crate::utils::{parse_minutes, parse_timestamp};

pub const NAME_ALIASES: &[&str] = &["Name", "Name (Original Name)", "Name (original name)"];
pub const EMAIL_ALIASES: &[&str] = &["Email", "User Email"];
pub const JOIN_ALIASES: &[&str] = &["Join Time", "Join time"];
pub const LEAVE_ALIASES: &[&str] = &["Leave Time", "Leave time"];
pub const DURATION_ALIASES: &[&str] = &["Duration", "Duration (minutes)"];

const TABLE: &str = "attendance log";

/// Column positions of one export, resolved from its header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSchema {
    pub name: usize,
    pub email: usize,
    pub join: usize,
    pub leave: usize,
    /// Exports without a duration column fall back to `leave - join`.
    pub duration: Option<usize>,
}

impl LogSchema {
    pub fn resolve(headers: &[String]) -> Result<Self> {
        Ok(Self {
            name: require_column(headers, "name", NAME_ALIASES)?,
            email: require_column(headers, "email", EMAIL_ALIASES)?,
            join: require_column(headers, "join time", JOIN_ALIASES)?,
            leave: require_column(headers, "leave time", LEAVE_ALIASES)?,
            duration: find_column(headers, DURATION_ALIASES),
        })
    }
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| headers.iter().position(|h| h == alias))
}

fn require_column(
    headers: &[String],
    field: &'static str,
    aliases: &[&'static str],
) -> Result<usize> {
    find_column(headers, aliases).ok_or_else(|| AttendanceError::MissingColumn {
        table: TABLE,
        field,
        aliases: aliases.to_vec(),
    })
}

/// A data row left out of aggregation, with the line it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub line: usize,
    pub reason: String,
}

/// A fully materialised log: every valid event plus the rows that were not.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLog {
    pub source: String,
    pub events: Vec<AttendanceEvent>,
    pub skipped: Vec<SkippedRow>,
}

pub fn read_log(path: &Path, skip_rows: usize) -> Result<ParsedLog> {
    let text = fs::read_to_string(path)?;
    parse_log(&path.display().to_string(), &text, skip_rows)
}

/// Parse export text. Unusable rows are skipped and recorded rather than
/// failing the whole log; a missing required column is fatal.
pub fn parse_log(source: &str, text: &str, skip_rows: usize) -> Result<ParsedLog> {
    let body = skip_lines(text.trim_start_matches('\u{feff}'), skip_rows);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let schema = LogSchema::resolve(&headers)?;

    let mut events = Vec::new();
    let mut skipped = Vec::new();

    for record in reader.records() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize + skip_rows)
            .unwrap_or_default();

        match parse_event(&schema, &record) {
            Ok(event) => events.push(event),
            Err(reason) => {
                tracing::warn!(source, line, %reason, "skipping malformed attendance row");
                skipped.push(SkippedRow { line, reason });
            }
        }
    }

    tracing::debug!(
        source,
        events = events.len(),
        skipped = skipped.len(),
        "parsed attendance log"
    );

    Ok(ParsedLog {
        source: source.to_string(),
        events,
        skipped,
    })
}

fn parse_event(
    schema: &LogSchema,
    record: &csv::StringRecord,
) -> std::result::Result<AttendanceEvent, String> {
    let cell = |idx: usize| record.get(idx).unwrap_or("").trim();

    let display_name = cell(schema.name);
    if display_name.is_empty() {
        return Err("participant name is blank".to_string());
    }

    let join = parse_timestamp(cell(schema.join)).map_err(|e| format!("join time: {e}"))?;
    let leave = parse_timestamp(cell(schema.leave)).map_err(|e| format!("leave time: {e}"))?;
    let interval = Interval::new(join, leave)
        .ok_or_else(|| format!("join time {join} is not before leave time {leave}"))?;

    let logged_minutes = match schema.duration {
        Some(idx) => parse_minutes("duration", cell(idx)).map_err(|e| e.to_string())?,
        None => interval.minutes(),
    };

    Ok(AttendanceEvent {
        participant_key: participant_key(display_name),
        display_name: display_name.to_string(),
        email: cell(schema.email).to_string(),
        interval,
        logged_minutes,
    })
}

/// Drop the first `n` physical lines. Metadata blocks may contain blank
/// lines, which a CSV reader would otherwise silently swallow.
fn skip_lines(text: &str, n: usize) -> &str {
    let mut rest = text;
    for _ in 0..n {
        match rest.find('\n') {
            Some(idx) => rest = &rest[idx + 1..],
            None => return "",
        }
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
Meeting ID,Topic,Start Time
123 456 789,Weekly sync,2024-03-04 09:55:00

Name (Original Name),User Email,Join Time,Leave Time,Duration (Minutes),Guest
Jane Doe,jane@example.com,2024-03-04 09:58:00,2024-03-04 10:05:00,7,No
jane  DOE,jane@example.com,2024-03-04 10:10:00,2024-03-04 10:40:00,30,No
Bob Ray,,2024-03-04 10:00:00,2024-03-04 10:20:00,20,Yes
";

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_aliases_in_preference_order() {
        let schema = LogSchema::resolve(&headers(&[
            "User Email",
            "Name",
            "Join time",
            "Leave Time",
            "Duration",
        ]))
        .unwrap();
        assert_eq!(
            schema,
            LogSchema {
                name: 1,
                email: 0,
                join: 2,
                leave: 3,
                duration: Some(4),
            }
        );
    }

    #[test]
    fn missing_column_names_every_alias() {
        let err = LogSchema::resolve(&headers(&["Name", "Email", "Join Time"])).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, AttendanceError::MissingColumn { field: "leave time", .. }));
        assert!(msg.contains("Leave Time, Leave time"), "unexpected message: {msg}");
    }

    #[test]
    fn parses_export_after_metadata_block() {
        // "Duration (Minutes)" is not an accepted alias, so durations come from the spans.
        let log = parse_log("weekly.csv", EXPORT, 3).unwrap();
        assert_eq!(log.events.len(), 3);
        assert!(log.skipped.is_empty());

        let second = &log.events[1];
        assert_eq!(second.participant_key, "jane doe");
        assert_eq!(second.display_name, "jane  DOE");
        assert_eq!(second.logged_minutes, 30.0);
        assert_eq!(log.events[2].email, "");
    }

    #[test]
    fn duration_column_is_used_when_present() {
        let text = "\
Name,Email,Join Time,Leave Time,Duration
Ann,a@x.io,2024-03-04 10:00:00,2024-03-04 10:10:00,11
";
        let log = parse_log("d.csv", text, 0).unwrap();
        assert_eq!(log.events[0].logged_minutes, 11.0);
    }

    #[test]
    fn malformed_rows_are_skipped_and_counted() {
        let text = "\
Name,Email,Join Time,Leave Time,Duration
Ann,a@x.io,2024-03-04 10:00:00,2024-03-04 10:10:00,10
Ben,b@x.io,yesterday,2024-03-04 10:10:00,10
Cy,c@x.io,2024-03-04 10:30:00,2024-03-04 10:10:00,5
,d@x.io,2024-03-04 10:00:00,2024-03-04 10:10:00,10
Eve,e@x.io,2024-03-04 10:00:00,2024-03-04 10:10:00,ten
";
        let log = parse_log("bad.csv", text, 0).unwrap();
        assert_eq!(log.events.len(), 1);
        assert_eq!(log.skipped.len(), 4);
        assert_eq!(log.skipped[0].line, 3);
        assert!(log.skipped[0].reason.starts_with("join time"));
        assert!(log.skipped[1].reason.contains("not before"));
        assert!(log.skipped[3].reason.contains("duration"));
    }

    #[test]
    fn missing_header_is_fatal() {
        let err = parse_log("short.csv", "only\nmetadata\n", 3).unwrap_err();
        assert!(matches!(err, AttendanceError::MissingColumn { .. }));
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("weekly.csv");
        fs::write(&path, EXPORT).unwrap();

        let log = read_log(&path, 3).unwrap();
        assert_eq!(log.events.len(), 3);
        assert!(log.source.ends_with("weekly.csv"));
    }
}
