use std::fs;
use std::path::Path;

use crate::error::Result;

/// A header-prefixed table of string cells, as read from or written to CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    /// First column whose header equals any alias, ignoring case and
    /// surrounding whitespace. Aliases are tried in order.
    pub fn find_column(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| {
            self.headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(alias))
        })
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_rows_and_trims_headers() {
        let table = Table::parse("\u{feff} Name ,Email\nAnn\n").unwrap();
        assert_eq!(table.headers, vec!["Name", "Email"]);
        assert_eq!(table.rows, vec![vec!["Ann".to_string(), String::new()]]);
        assert_eq!(table.cell(0, 1), "");
        assert_eq!(table.cell(5, 0), "");
    }

    #[test]
    fn finds_columns_case_insensitively() {
        let table = Table::parse("EMAIL_ID,Participant Name\n").unwrap();
        assert_eq!(table.find_column(&["email", "email_id"]), Some(0));
        assert_eq!(table.find_column(&["participant name", "name"]), Some(1));
        assert_eq!(table.find_column(&["phone"]), None);
    }

    #[test]
    fn writes_quoted_csv() {
        let mut table = Table::new(vec!["Name".into(), "Note".into()]);
        table.push_row(vec!["Doe, Jane".into(), "ok".into()]);
        let bytes = table.to_csv().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "Name,Note\n\"Doe, Jane\",ok\n");
    }
}
