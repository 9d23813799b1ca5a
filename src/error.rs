use chrono::NaiveDateTime;
use thiserror::Error;

/// Failures raised by the attendance core.
///
/// Row-level problems inside a log are not surfaced through this type; they
/// are counted on the parsed log instead (see `log_reader::SkippedRow`).
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// A required column could not be resolved against any accepted alias.
    #[error("{table} must contain one of the following {field} columns: {}", aliases.join(", "))]
    MissingColumn {
        table: &'static str,
        field: &'static str,
        aliases: Vec<&'static str>,
    },

    #[error("invalid datetime format: {value:?}. Expected format: YYYY-MM-DD HH:MM:SS")]
    InvalidTimestamp { value: String },

    #[error("invalid {field} value: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    /// Session start is not strictly before its end.
    #[error("session {session}: start {start} must be before end {end}")]
    DegenerateWindow {
        session: usize,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("session {session}: required minutes must not be negative (got {required})")]
    NegativeRequirement { session: usize, required: f64 },

    #[error("no sessions configured for {file}")]
    NoSessions { file: String },

    #[error("{table} contains no data rows")]
    EmptyTable { table: &'static str },

    #[error("output {path} is already produced by another input in this batch")]
    OutputCollision { path: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
