//! Roster and raw-log tables for identity matching, and the two tables the
//! match produces.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::AttendanceError;
use crate::matcher::{MatchOptions, MatchOutcome, match_names};
use crate::table::Table;
use crate::utils::{file_stem, output_dir_for, write_atomic};

pub const ROSTER_EMAIL_ALIASES: &[&str] = &["email", "email_id"];
pub const ROSTER_NAME_ALIASES: &[&str] = &["participant name", "name"];
pub const RAW_NAME_ALIASES: &[&str] = &["name", "participant name"];

pub const UNMATCHED_NAME_HEADER: &str = "Raw Name (not found in Master)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCell {
    Present,
    Absent,
    NotAvailable,
}

impl StatusCell {
    /// `P`/`A` in any case; everything else is not available.
    pub fn from_cell(value: &str) -> Self {
        match value.trim() {
            v if v.eq_ignore_ascii_case("p") => StatusCell::Present,
            v if v.eq_ignore_ascii_case("a") => StatusCell::Absent,
            _ => StatusCell::NotAvailable,
        }
    }
}

impl fmt::Display for StatusCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatusCell::Present => "present",
            StatusCell::Absent => "absent",
            StatusCell::NotAvailable => "N/A",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub name: String,
    pub statuses: Vec<StatusCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub status_columns: Vec<String>,
    pub entries: Vec<RawEntry>,
}

pub fn load_roster(table: &Table) -> std::result::Result<Vec<RosterEntry>, AttendanceError> {
    let email = table
        .find_column(ROSTER_EMAIL_ALIASES)
        .ok_or_else(|| missing("roster", "email", ROSTER_EMAIL_ALIASES))?;
    let name = table
        .find_column(ROSTER_NAME_ALIASES)
        .ok_or_else(|| missing("roster", "participant name", ROSTER_NAME_ALIASES))?;

    Ok((0..table.rows.len())
        .map(|row| RosterEntry {
            name: table.cell(row, name).trim().to_string(),
            email: table.cell(row, email).trim().to_string(),
        })
        .collect())
}

/// Every column other than the name column is a status column.
pub fn load_raw(table: &Table) -> std::result::Result<RawLog, AttendanceError> {
    let name = table
        .find_column(RAW_NAME_ALIASES)
        .ok_or_else(|| missing("raw log", "name", RAW_NAME_ALIASES))?;
    let status_idx: Vec<usize> = (0..table.headers.len()).filter(|&i| i != name).collect();
    if status_idx.is_empty() {
        return Err(missing("raw log", "status", &["<any other column>"]));
    }

    let entries = (0..table.rows.len())
        .map(|row| RawEntry {
            name: table.cell(row, name).trim().to_string(),
            statuses: status_idx
                .iter()
                .map(|&col| StatusCell::from_cell(table.cell(row, col)))
                .collect(),
        })
        .collect();

    Ok(RawLog {
        status_columns: status_idx
            .iter()
            .map(|&i| table.headers[i].clone())
            .collect(),
        entries,
    })
}

fn missing(table: &'static str, field: &'static str, aliases: &[&'static str]) -> AttendanceError {
    AttendanceError::MissingColumn {
        table,
        field,
        aliases: aliases.to_vec(),
    }
}

/// Roster rows in roster order, with the matched raw statuses or `N/A`.
pub fn matched_table(roster: &[RosterEntry], raw: &RawLog, outcome: &MatchOutcome) -> Table {
    let mut headers = vec!["Email".to_string(), "Participant Name".to_string()];
    headers.extend(raw.status_columns.iter().cloned());

    let mut table = Table::new(headers);
    for (entry, pair) in roster.iter().zip(&outcome.pairs) {
        let mut row = vec![entry.email.clone(), entry.name.clone()];
        match pair.raw_index.and_then(|j| raw.entries.get(j)) {
            Some(found) => row.extend(found.statuses.iter().map(ToString::to_string)),
            None => row.extend(
                raw.status_columns
                    .iter()
                    .map(|_| StatusCell::NotAvailable.to_string()),
            ),
        }
        table.push_row(row);
    }
    table
}

pub fn unmatched_table(raw: &RawLog, outcome: &MatchOutcome) -> Table {
    let mut headers = vec![UNMATCHED_NAME_HEADER.to_string()];
    headers.extend(raw.status_columns.iter().cloned());

    let mut table = Table::new(headers);
    for entry in outcome.unmatched_raw.iter().filter_map(|&j| raw.entries.get(j)) {
        let mut row = vec![entry.name.clone()];
        row.extend(entry.statuses.iter().map(ToString::to_string));
        table.push_row(row);
    }
    table
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRun {
    pub matched_path: PathBuf,
    pub unmatched_path: PathBuf,
    pub roster_rows: usize,
    pub matched_rows: usize,
    pub unmatched_raw_rows: usize,
}

/// Match a roster file against a raw-log file and write both result tables.
pub fn run_match(
    roster_path: &Path,
    raw_path: &Path,
    out_dir: Option<&Path>,
    options: &MatchOptions,
) -> Result<MatchRun> {
    let roster_table = Table::read(roster_path)
        .with_context(|| format!("Failed to read roster {}", roster_path.display()))?;
    let raw_table = Table::read(raw_path)
        .with_context(|| format!("Failed to read raw log {}", raw_path.display()))?;

    let roster = load_roster(&roster_table)
        .with_context(|| format!("Invalid roster {}", roster_path.display()))?;
    let raw = load_raw(&raw_table)
        .with_context(|| format!("Invalid raw log {}", raw_path.display()))?;

    let roster_names: Vec<&str> = roster.iter().map(|r| r.name.as_str()).collect();
    let raw_names: Vec<&str> = raw.entries.iter().map(|r| r.name.as_str()).collect();
    let outcome = match_names(&roster_names, &raw_names, options);

    let dir = output_dir_for(roster_path, out_dir);
    let prefix = format!(
        "{}_matched_with_{}_",
        file_stem(roster_path),
        file_stem(raw_path)
    );
    let matched_path = dir.join(format!("{prefix}matched.csv"));
    let unmatched_path = dir.join(format!("{prefix}unmatched.csv"));

    // Render both tables before touching the filesystem.
    let matched_csv = matched_table(&roster, &raw, &outcome).to_csv()?;
    let unmatched_csv = unmatched_table(&raw, &outcome).to_csv()?;
    write_atomic(&matched_path, &matched_csv)
        .with_context(|| format!("Failed to write {}", matched_path.display()))?;
    write_atomic(&unmatched_path, &unmatched_csv)
        .with_context(|| format!("Failed to write {}", unmatched_path.display()))?;

    let run = MatchRun {
        matched_path,
        unmatched_path,
        roster_rows: roster.len(),
        matched_rows: outcome.pairs.iter().filter(|p| p.raw_index.is_some()).count(),
        unmatched_raw_rows: outcome.unmatched_raw.len(),
    };
    tracing::info!(
        roster = %roster_path.display(),
        raw = %raw_path.display(),
        matched = run.matched_rows,
        claimed_raw = outcome.matched_raw().len(),
        unmatched = run.unmatched_raw_rows,
        threshold = options.threshold,
        "matched roster against raw log"
    );
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const ROSTER: &str = "\
Sr,Participant Name,Email
1,Jon Smith,jon@example.com
2,Priya Raman,priya@example.com
3,,ghost@example.com
";

    const RAW: &str = "\
Name,Session 1 (2024-03-04 10:00:00),Session 2 (2024-03-05 10:00:00)
smith jon,P,a
jonathan smyth,A,P
raman priya,p,
";

    #[test]
    fn status_cells_normalize() {
        assert_eq!(StatusCell::from_cell(" p "), StatusCell::Present);
        assert_eq!(StatusCell::from_cell("A"), StatusCell::Absent);
        assert_eq!(StatusCell::from_cell("late"), StatusCell::NotAvailable);
        assert_eq!(StatusCell::from_cell(""), StatusCell::NotAvailable);
        assert_eq!(StatusCell::Absent.to_string(), "absent");
    }

    #[test]
    fn roster_requires_name_and_email() {
        let table = Table::parse("Name,Phone\nAnn,1\n").unwrap();
        let err = load_roster(&table).unwrap_err();
        assert!(err.to_string().contains("email, email_id"));
    }

    #[test]
    fn raw_requires_a_status_column() {
        let table = Table::parse("Participant Name\nAnn\n").unwrap();
        assert!(matches!(
            load_raw(&table),
            Err(AttendanceError::MissingColumn { field: "status", .. })
        ));
    }

    #[test]
    fn builds_matched_and_unmatched_tables() {
        let roster = load_roster(&Table::parse(ROSTER).unwrap()).unwrap();
        let raw = load_raw(&Table::parse(RAW).unwrap()).unwrap();
        let names: Vec<&str> = roster.iter().map(|r| r.name.as_str()).collect();
        let raw_names: Vec<&str> = raw.entries.iter().map(|r| r.name.as_str()).collect();
        let outcome = match_names(&names, &raw_names, &MatchOptions::default());

        let matched = matched_table(&roster, &raw, &outcome);
        assert_eq!(
            matched.headers,
            vec![
                "Email",
                "Participant Name",
                "Session 1 (2024-03-04 10:00:00)",
                "Session 2 (2024-03-05 10:00:00)",
            ]
        );
        assert_eq!(
            matched.rows[0],
            vec!["jon@example.com", "Jon Smith", "present", "absent"]
        );
        assert_eq!(
            matched.rows[1],
            vec!["priya@example.com", "Priya Raman", "present", "N/A"]
        );
        assert_eq!(matched.rows[2][2..4], ["N/A", "N/A"]);

        let unmatched = unmatched_table(&raw, &outcome);
        assert_eq!(unmatched.headers[0], UNMATCHED_NAME_HEADER);
        assert_eq!(unmatched.rows, vec![vec!["jonathan smyth", "absent", "present"]]);
    }

    #[test]
    fn run_match_writes_both_outputs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let roster_path = dir.path().join("master.csv");
        let raw_path = dir.path().join("zoom-RAW.csv");
        fs::write(&roster_path, ROSTER).unwrap();
        fs::write(&raw_path, RAW).unwrap();

        let run = run_match(&roster_path, &raw_path, None, &MatchOptions::default()).unwrap();

        assert_eq!(
            run.matched_path,
            dir.path().join("master_matched_with_zoom-RAW_matched.csv")
        );
        assert_eq!(run.roster_rows, 3);
        assert_eq!(run.matched_rows, 2);
        assert_eq!(run.unmatched_raw_rows, 1);

        let unmatched = fs::read_to_string(&run.unmatched_path).unwrap();
        assert!(unmatched.contains("jonathan smyth,absent,present"));
    }

    #[test]
    fn run_match_fails_without_writing_on_bad_roster() {
        let dir = tempfile::tempdir().expect("tempdir");
        let roster_path = dir.path().join("master.csv");
        let raw_path = dir.path().join("raw.csv");
        fs::write(&roster_path, "Who\nAnn\n").unwrap();
        fs::write(&raw_path, RAW).unwrap();

        let err = run_match(&roster_path, &raw_path, None, &MatchOptions::default()).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid roster"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
