//! Running the presence pipeline over one or many meeting logs.
//!
//! Each input file is an independent unit: it is read, aggregated and
//! written on its own, in parallel with its siblings, and a failure is
//! reported for that file alone.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use crate::aggregator::aggregate;
use crate::error::AttendanceError;
use crate::log_reader::read_log;
use crate::report::{attendance_csv, summary_text};
use crate::sessions::{sessions_for_file, validate_sessions};
use crate::types::{AttendanceReport, SessionWindow};
use crate::utils::{file_name, file_stem, output_dir_for, write_atomic};

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub skip_rows: usize,
    pub out_dir: Option<PathBuf>,
    pub decimal_places: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReport {
    pub attendance_path: PathBuf,
    pub summary_path: PathBuf,
    pub report: AttendanceReport,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub result: Result<GeneratedReport>,
}

/// Suffixes of files this tool writes next to its inputs.
const GENERATED_SUFFIXES: &[&str] = &[
    "_processed.csv",
    "_matched.csv",
    "_unmatched.csv",
    "-raw.csv",
];

/// Whether `path` looks like one of our own outputs rather than a meeting log.
pub fn is_generated_output(path: &Path) -> bool {
    let name = file_name(path).to_ascii_lowercase();
    GENERATED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Expand CLI inputs into a de-duplicated, ordered list of log files.
///
/// Existing files are taken as-is, directories are walked for `.csv` files
/// and anything else is treated as a glob pattern. Directory and glob
/// expansion skip previously generated outputs.
pub fn discover_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    let mut push = |path: PathBuf| {
        if seen.insert(path.clone()) {
            files.push(path);
        }
    };

    for input in inputs {
        let path = Path::new(input);
        if path.is_file() {
            push(path.to_path_buf());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| {
                    p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
                        && !is_generated_output(p)
                })
                .collect();
            found.sort();
            found.into_iter().for_each(&mut push);
        } else {
            let mut matched = false;
            for entry in glob::glob(input).with_context(|| format!("Invalid pattern {input}"))? {
                let entry = entry.with_context(|| format!("Failed to expand {input}"))?;
                if entry.is_file() && !is_generated_output(&entry) {
                    matched = true;
                    push(entry);
                }
            }
            if !matched {
                anyhow::bail!("No input files match {}", input);
            }
        }
    }

    Ok(files)
}

pub fn attendance_output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    output_dir_for(input, out_dir).join(format!("{}_processed.csv", file_stem(input)))
}

pub fn summary_output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    output_dir_for(input, out_dir).join(format!("{}_summary.txt", file_stem(input)))
}

/// Aggregate one log with the sessions that apply to it and write its
/// outputs. Either both outputs are written or neither is.
pub fn process_file(
    input: &Path,
    sessions: &[SessionWindow],
    options: &GenerateOptions,
) -> Result<GeneratedReport> {
    let applicable = sessions_for_file(sessions, &file_name(input));
    let log = read_log(input, options.skip_rows)
        .with_context(|| format!("Error reading file '{}'", input.display()))?;
    let report = aggregate(&log, &applicable)
        .with_context(|| format!("Error processing file '{}'", input.display()))?;

    let out_dir = options.out_dir.as_deref();
    let attendance_path = attendance_output_path(input, out_dir);
    let summary_path = summary_output_path(input, out_dir);

    let rendered = attendance_csv(&report, options.decimal_places)?;
    let summary = summary_text(&report);

    write_atomic(&attendance_path, &rendered)
        .with_context(|| format!("Failed to write {}", attendance_path.display()))?;
    if let Err(e) = write_atomic(&summary_path, summary.as_bytes()) {
        let _ = std::fs::remove_file(&attendance_path);
        return Err(e).with_context(|| format!("Failed to write {}", summary_path.display()));
    }

    Ok(GeneratedReport {
        attendance_path,
        summary_path,
        report,
    })
}

/// 1-based positions of sessions bound to a file that is not among `inputs`.
pub fn unbound_sessions(sessions: &[SessionWindow], inputs: &[PathBuf]) -> Vec<usize> {
    let names: HashSet<String> = inputs.iter().map(|p| file_name(p)).collect();
    sessions
        .iter()
        .enumerate()
        .filter(|(_, s)| s.file.as_ref().is_some_and(|f| !names.contains(f)))
        .map(|(idx, _)| idx + 1)
        .collect()
}

/// Validate the full session list once, then process every input in
/// parallel. Outcomes come back in input order.
pub fn run_batch(
    inputs: &[PathBuf],
    sessions: &[SessionWindow],
    options: &GenerateOptions,
) -> Result<Vec<FileOutcome>> {
    validate_sessions(sessions)?;
    for index in unbound_sessions(sessions, inputs) {
        tracing::warn!(
            session = index,
            file = sessions[index - 1].file.as_deref().unwrap_or_default(),
            "session is bound to a file that is not among the inputs"
        );
    }

    // Two inputs must never race for the same output file; later ones lose.
    let mut claimed = HashSet::new();
    let collisions: Vec<bool> = inputs
        .iter()
        .map(|input| {
            let path = attendance_output_path(input, options.out_dir.as_deref());
            !claimed.insert(path)
        })
        .collect();

    let outcomes = inputs
        .par_iter()
        .zip(collisions.par_iter())
        .map(|(input, &collides)| {
            let result = if collides {
                Err(AttendanceError::OutputCollision {
                    path: attendance_output_path(input, options.out_dir.as_deref())
                        .display()
                        .to_string(),
                })
                .with_context(|| format!("Skipping '{}'", input.display()))
            } else {
                process_file(input, sessions, options)
            };

            match &result {
                Ok(generated) => tracing::info!(
                    input = %input.display(),
                    output = %generated.attendance_path.display(),
                    "generated attendance"
                ),
                Err(e) => tracing::warn!(input = %input.display(), "failed: {e:#}"),
            }

            FileOutcome {
                input: input.clone(),
                result,
            }
        })
        .collect();
    Ok(outcomes)
}
