use crate::error::Result;
use crate::table::Table;
use crate::types::{AttendanceReport, TIMESTAMP_FORMAT};
use crate::utils::format_decimal;

/// One row per participant: identity, global span, a `P`/`A` column per
/// session, total logged minutes and the concatenated shortfall reasons.
pub fn attendance_table(report: &AttendanceReport, decimal_places: usize) -> Table {
    let mut headers: Vec<String> = ["Name", "Email", "Join Time", "Leave Time"]
        .into_iter()
        .map(String::from)
        .collect();
    headers.extend(report.session_labels.iter().cloned());
    headers.push("Total Duration".to_string());
    headers.push("Shortfall Reason".to_string());

    let mut table = Table::new(headers);
    for p in &report.participants {
        let mut row = vec![
            p.name.clone(),
            p.email.clone(),
            p.global_join.format(TIMESTAMP_FORMAT).to_string(),
            p.global_leave.format(TIMESTAMP_FORMAT).to_string(),
        ];
        row.extend((1..=report.session_labels.len()).map(|i| {
            p.sessions
                .get(&i)
                .map(|s| s.status.code())
                .unwrap_or("A")
                .to_string()
        }));
        row.push(format_decimal(p.total_duration_minutes, decimal_places));
        row.push(p.shortfall_reason.clone());
        table.push_row(row);
    }
    table
}

pub fn attendance_csv(report: &AttendanceReport, decimal_places: usize) -> Result<Vec<u8>> {
    attendance_table(report, decimal_places).to_csv()
}

pub fn summary_text(report: &AttendanceReport) -> String {
    let mut lines: Vec<String> = report.summary.iter().map(ToString::to_string).collect();
    if report.skipped_rows > 0 {
        lines.push(format!("Skipped malformed rows: {}", report.skipped_rows));
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}
