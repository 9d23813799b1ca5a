//! Reduce an attendance report to the `Name` + status columns that the
//! identity matcher consumes as its raw log.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::AttendanceError;
use crate::table::Table;
use crate::utils::{file_stem, output_dir_for, write_atomic};

const NAME_ALIASES: &[&str] = &["name", "participant name"];

/// A column holds statuses when its distinct non-empty values are all P/A.
fn is_status_column(table: &Table, col: usize) -> bool {
    let values: BTreeSet<String> = (0..table.rows.len())
        .map(|row| table.cell(row, col).trim().to_ascii_uppercase())
        .filter(|v| !v.is_empty())
        .collect();
    !values.is_empty() && values.iter().all(|v| v == "P" || v == "A")
}

pub fn extract_statuses(report: &Table) -> std::result::Result<Table, AttendanceError> {
    let name = report
        .find_column(NAME_ALIASES)
        .ok_or_else(|| AttendanceError::MissingColumn {
            table: "attendance report",
            field: "name",
            aliases: NAME_ALIASES.to_vec(),
        })?;

    let others = (0..report.headers.len()).filter(|&c| c != name);
    let mut status_cols: Vec<usize> = others
        .clone()
        .filter(|&c| is_status_column(report, c))
        .collect();
    if status_cols.is_empty() {
        status_cols = others
            .filter(|&c| report.headers[c].to_lowercase().contains("session"))
            .collect();
    }

    let mut headers = vec!["Name".to_string()];
    headers.extend(status_cols.iter().map(|&c| report.headers[c].clone()));

    let mut out = Table::new(headers);
    for row in 0..report.rows.len() {
        let mut cells = vec![report.cell(row, name).to_string()];
        cells.extend(status_cols.iter().map(|&c| {
            let value = report.cell(row, c).trim().to_ascii_uppercase();
            if value == "P" || value == "A" {
                value
            } else {
                "N/A".to_string()
            }
        }));
        out.push_row(cells);
    }
    Ok(out)
}

/// Write `<stem>-RAW.csv` for one report and return its path.
pub fn run_extract(report_path: &Path, out_dir: Option<&Path>) -> Result<PathBuf> {
    let report = Table::read(report_path)
        .with_context(|| format!("Failed to read report {}", report_path.display()))?;
    let raw = extract_statuses(&report)
        .with_context(|| format!("Invalid report {}", report_path.display()))?;

    let path = output_dir_for(report_path, out_dir)
        .join(format!("{}-RAW.csv", file_stem(report_path)));
    write_atomic(&path, &raw.to_csv()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!(
        report = %report_path.display(),
        output = %path.display(),
        columns = raw.headers.len() - 1,
        "extracted raw statuses"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Name,Email,Join Time,Leave Time,Session 1 (2024-03-04 10:00:00),Session 2 (2024-03-05 10:00:00),Total Duration,Shortfall Reason
Ann,ann@x.io,2024-03-04 10:00:00,2024-03-05 11:00:00,P,A,60,
Ben,ben@x.io,2024-03-04 10:00:00,2024-03-04 10:05:00,A,a,5,short
";

    #[test]
    fn keeps_only_status_columns() {
        let raw = extract_statuses(&Table::parse(REPORT).unwrap()).unwrap();
        assert_eq!(
            raw.headers,
            vec![
                "Name",
                "Session 1 (2024-03-04 10:00:00)",
                "Session 2 (2024-03-05 10:00:00)"
            ]
        );
        assert_eq!(raw.rows[1], vec!["Ben", "A", "A"]);
    }

    #[test]
    fn falls_back_to_session_headers() {
        let text = "Participant Name,Session A,Notes\nAnn,late,x\n";
        let raw = extract_statuses(&Table::parse(text).unwrap()).unwrap();
        assert_eq!(raw.headers, vec!["Name", "Session A"]);
        assert_eq!(raw.rows[0], vec!["Ann", "N/A"]);
    }

    #[test]
    fn requires_name_column() {
        let err = extract_statuses(&Table::parse("Who,S1\nAnn,P\n").unwrap()).unwrap_err();
        assert!(matches!(err, AttendanceError::MissingColumn { .. }));
    }

    #[test]
    fn writes_raw_file_next_to_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("monday_processed.csv");
        std::fs::write(&path, REPORT).unwrap();

        let out = run_extract(&path, None).unwrap();
        assert_eq!(out, dir.path().join("monday_processed-RAW.csv"));
        let text = std::fs::read_to_string(out).unwrap();
        assert!(text.starts_with("Name,Session 1"));
    }
}
