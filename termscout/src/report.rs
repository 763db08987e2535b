use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::errors::SearchResult;
use crate::results::SearchReport;

/// Column names of the CSV report, one row per occurrence
pub const CSV_HEADER: [&str; 4] = [
    "filepath",
    "total_matches_in_file",
    "line_number",
    "column_position",
];

/// Output format of a persisted report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown report format '{}' (expected csv or json)",
                other
            )),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Persists a finished report
pub trait ReportWriter {
    fn write_report(&self, report: &SearchReport, out: &mut dyn Write) -> SearchResult<()>;
}

#[derive(Serialize)]
struct CsvRow {
    filepath: String,
    total_matches_in_file: usize,
    line_number: usize,
    column_position: usize,
}

/// One row per occurrence; a file's total is repeated on each of its rows
///
/// The header is written even when the report is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReportWriter;

impl ReportWriter for CsvReportWriter {
    fn write_report(&self, report: &SearchReport, out: &mut dyn Write) -> SearchResult<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(out);
        writer.write_record(CSV_HEADER)?;

        for file in &report.file_results {
            let filepath = file.path().display().to_string();
            for occurrence in file.occurrences() {
                writer.serialize(CsvRow {
                    filepath: filepath.clone(),
                    total_matches_in_file: file.total_count(),
                    line_number: occurrence.line_number,
                    column_position: occurrence.column_start,
                })?;
            }
        }

        writer.flush()?;
        Ok(())
    }
}

/// The whole report, warnings included, as pretty-printed JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportWriter;

impl ReportWriter for JsonReportWriter {
    fn write_report(&self, report: &SearchReport, out: &mut dyn Write) -> SearchResult<()> {
        serde_json::to_writer_pretty(&mut *out, report)?;
        writeln!(out)?;
        Ok(())
    }
}

/// Writer for `format`
pub fn report_writer(format: ReportFormat) -> Box<dyn ReportWriter> {
    match format {
        ReportFormat::Csv => Box::new(CsvReportWriter),
        ReportFormat::Json => Box::new(JsonReportWriter),
    }
}

/// Creates (or truncates) `path` and writes the report into it
pub fn write_report_to_path(
    report: &SearchReport,
    format: ReportFormat,
    path: &Path,
) -> SearchResult<()> {
    debug!("Writing {} report to {}", format, path.display());
    let mut out = BufWriter::new(File::create(path)?);
    report_writer(format).write_report(report, &mut out)?;
    out.flush()?;
    Ok(())
}
