use std::fs;
use std::path::Path;

use crate::error::{AttendanceError, Result};
use crate::types::SessionWindow;
use crate::utils::{parse_minutes, parse_timestamp};

const TABLE: &str = "session config";

/// Parse an inline `START,END,REQUIRED_MINUTES` session definition.
pub fn parse_session_arg(value: &str) -> std::result::Result<SessionWindow, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [start, end, required] = parts.as_slice() else {
        return Err(format!(
            "expected START,END,REQUIRED_MINUTES but got {value:?}"
        ));
    };

    Ok(SessionWindow::new(
        parse_timestamp(start).map_err(|e| e.to_string())?,
        parse_timestamp(end).map_err(|e| e.to_string())?,
        parse_minutes("time required", required).map_err(|e| e.to_string())?,
    ))
}

pub fn read_session_config(path: &Path) -> Result<Vec<SessionWindow>> {
    let text = fs::read_to_string(path)?;
    parse_session_config(&text)
}

/// Parse a session config table with `Session Start`, `Session End`,
/// `Time Required` and an optional `File` column.
pub fn parse_session_config(text: &str) -> Result<Vec<SessionWindow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let column = |field: &'static str| {
        headers
            .iter()
            .position(|h| h == field)
            .ok_or_else(|| AttendanceError::MissingColumn {
                table: TABLE,
                field,
                aliases: vec![field],
            })
    };
    let start_col = column("Session Start")?;
    let end_col = column("Session End")?;
    let required_col = column("Time Required")?;
    let file_col = headers.iter().position(|h| h == "File");

    let mut sessions = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = record.position().map(|p| p.line() as usize).unwrap_or_default();
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim();

        let invalid = |e: AttendanceError| AttendanceError::InvalidRow {
            row,
            reason: e.to_string(),
        };
        let start = parse_timestamp(cell(start_col)).map_err(invalid)?;
        let end = parse_timestamp(cell(end_col)).map_err(invalid)?;
        let required = parse_minutes("time required", cell(required_col)).map_err(invalid)?;
        let file = file_col
            .map(|idx| cell(idx).to_string())
            .filter(|f| !f.is_empty());

        sessions.push(SessionWindow {
            start,
            end,
            required_minutes: required,
            file,
        });
    }

    if sessions.is_empty() {
        return Err(AttendanceError::EmptyTable { table: TABLE });
    }
    Ok(sessions)
}

/// Reject unusable windows before any aggregation starts. Sessions are
/// reported by their 1-based position.
pub fn validate_sessions(sessions: &[SessionWindow]) -> Result<()> {
    for (idx, session) in sessions.iter().enumerate() {
        let index = idx + 1;
        if session.start >= session.end {
            return Err(AttendanceError::DegenerateWindow {
                session: index,
                start: session.start,
                end: session.end,
            });
        }
        if session.required_minutes < 0.0 {
            return Err(AttendanceError::NegativeRequirement {
                session: index,
                required: session.required_minutes,
            });
        }
    }
    Ok(())
}

/// Sessions that apply to `file_name`, in configuration order.
pub fn sessions_for_file(sessions: &[SessionWindow], file_name: &str) -> Vec<SessionWindow> {
    sessions
        .iter()
        .filter(|s| s.applies_to(file_name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inline_session() {
        let session = parse_session_arg("2024-03-04 10:00:00, 2024-03-04T10:30, 25").unwrap();
        assert_eq!(session.required_minutes, 25.0);
        assert_eq!(session.label(1), "Session 1 (2024-03-04 10:00:00)");
        assert!(session.file.is_none());
    }

    #[test]
    fn inline_session_needs_three_parts() {
        let err = parse_session_arg("2024-03-04 10:00:00,2024-03-04 10:30:00").unwrap_err();
        assert!(err.contains("START,END,REQUIRED_MINUTES"));
        assert!(parse_session_arg("2024-03-04 10:00:00,2024-03-04 10:30:00,abc").is_err());
    }

    #[test]
    fn parses_config_with_file_binding() {
        let text = "\
Session Start,Session End,Time Required,File
2024-03-04 10:00:00,2024-03-04 10:30:00,25,monday.csv
2024-03-05 10:00:00,2024-03-05 11:00:00,45,
";
        let sessions = parse_session_config(text).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].file.as_deref(), Some("monday.csv"));
        assert_eq!(sessions[1].file, None);

        let monday = sessions_for_file(&sessions, "monday.csv");
        let tuesday = sessions_for_file(&sessions, "tuesday.csv");
        assert_eq!(monday.len(), 2);
        assert_eq!(tuesday.len(), 1);
        assert_eq!(tuesday[0].required_minutes, 45.0);
    }

    #[test]
    fn config_requires_columns_and_rows() {
        let err = parse_session_config("Session Start,Session End\n").unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::MissingColumn {
                field: "Time Required",
                ..
            }
        ));

        let err = parse_session_config("Session Start,Session End,Time Required\n").unwrap_err();
        assert!(matches!(err, AttendanceError::EmptyTable { .. }));
    }

    #[test]
    fn config_reports_bad_row() {
        let text = "\
Session Start,Session End,Time Required
2024-03-04 10:00:00,2024-03-04 10:30:00,25
soon,2024-03-04 10:30:00,25
";
        let err = parse_session_config(text).unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidRow { row: 3, .. }));
    }

    #[test]
    fn validation_rejects_degenerate_windows() {
        let ok = parse_session_arg("2024-03-04 10:00:00,2024-03-04 10:30:00,0").unwrap();
        let flat = parse_session_arg("2024-03-04 10:30:00,2024-03-04 10:30:00,5").unwrap();
        let negative = parse_session_arg("2024-03-04 11:00:00,2024-03-04 11:30:00,-1").unwrap();

        assert!(validate_sessions(&[ok.clone()]).is_ok());
        assert!(matches!(
            validate_sessions(&[ok.clone(), flat]),
            Err(AttendanceError::DegenerateWindow { session: 2, .. })
        ));
        assert!(matches!(
            validate_sessions(&[ok, negative]),
            Err(AttendanceError::NegativeRequirement { session: 2, .. })
        ));
    }
}
