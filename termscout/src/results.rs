/// This module implements the report types produced by a search.
///
/// # Ownership of Results
///
/// Every [`FileResult`] is built by exactly one worker and moved into the aggregation
/// buffer when the worker is done with it; nothing mutates it afterwards:
/// ```rust,ignore
/// let result = processor.process_file(&path)?; // owned by this worker
/// buffer.insert(result);                        // ownership moves to the buffer
/// ```
///
/// The finished [`SearchReport`] owns its results and warnings outright, so it can be
/// handed to a report writer or another thread without copying.
///
/// # Ordering
///
/// Workers finish in arbitrary order. The report therefore sorts its file results by
/// path before it is returned, and a file's occurrences are always ascending by line
/// then column because a single worker scans each file front to back.
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::errors::SearchError;

/// A single match position, both coordinates 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Occurrence {
    /// The line the match starts on
    pub line_number: usize,
    /// Character offset of the match start within the line
    pub column_start: usize,
}

impl Occurrence {
    pub fn new(line_number: usize, column_start: usize) -> Self {
        Self {
            line_number,
            column_start,
        }
    }
}

/// All occurrences found in a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    path: PathBuf,
    total_count: usize,
    occurrences: Vec<Occurrence>,
}

impl FileResult {
    /// Creates a result; the count is always the number of occurrences
    pub fn new(path: impl Into<PathBuf>, occurrences: Vec<Occurrence>) -> Self {
        debug_assert!(occurrences.windows(2).all(|w| w[0] <= w[1]));
        Self {
            path: path.into(),
            total_count: occurrences.len(),
            occurrences,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Occurrences in ascending line-then-column order
    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }
}

/// A path that was skipped, and why
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Warning {
    pub path: PathBuf,
    pub reason: String,
}

impl Warning {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Converts a per-file error into a warning about `path`
    ///
    /// The error's own path wins when it carries one.
    pub fn from_error(path: &Path, err: &SearchError) -> Self {
        let path = err.path().unwrap_or(path).to_path_buf();
        let reason = match err {
            SearchError::FileNotFound(_) => "file disappeared before it could be read".to_string(),
            SearchError::PermissionDenied(_) => "permission denied".to_string(),
            SearchError::EncodingError {
                line_number,
                source,
                ..
            } => format!("invalid UTF-8 at line {}: {}", line_number, source),
            SearchError::WalkError { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self { path, reason }
    }
}

/// Represents the complete search results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    /// Results per file; only files with matches
    ///
    /// Sorted with `Path`'s ordering, which compares component by component, so
    /// `a/b` comes before `a-b`.
    pub file_results: Vec<FileResult>,
    /// Skipped paths, sorted by path
    pub warnings: Vec<Warning>,
    /// Total number of occurrences found
    pub total_matches: usize,
    /// Total number of files scanned successfully
    pub files_searched: usize,
    /// Total number of files with at least one occurrence
    pub files_with_matches: usize,
    /// Whether the run was cancelled before every file was scanned
    pub truncated: bool,
}

impl SearchReport {
    /// Creates a new empty report
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a scanned file; files without occurrences are counted but not kept
    pub fn add_file_result(&mut self, file_result: FileResult) {
        self.files_searched += 1;
        if file_result.is_empty() {
            return;
        }
        self.total_matches += file_result.total_count();
        self.files_with_matches += 1;
        self.file_results.push(file_result);
    }

    pub fn add_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Puts results and warnings into their final path order
    pub(crate) fn sort(&mut self) {
        self.file_results
            .sort_by(|a, b| a.path().cmp(b.path()));
        self.warnings.sort();
    }

    /// Looks up the result for `path` in a sorted report
    pub fn file_result(&self, path: &Path) -> Option<&FileResult> {
        self.file_results
            .binary_search_by(|r| r.path().cmp(path))
            .ok()
            .map(|i| &self.file_results[i])
    }

    pub fn is_empty(&self) -> bool {
        self.file_results.is_empty()
    }
}
