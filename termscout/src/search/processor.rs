use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{trace, warn};

use super::matcher::TermMatcher;
use crate::config::EncodingMode;
use crate::errors::{SearchError, SearchResult};
use crate::metrics::SearchMetrics;
use crate::results::{FileResult, Occurrence};

// Constants for file processing
const BUFFER_CAPACITY: usize = 65536;
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// Strips the line terminator (`\n` or `\r\n`)
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Decodes one line according to the encoding mode
fn decode_line<'a>(
    bytes: &'a [u8],
    path: &Path,
    line_number: usize,
    encoding_mode: EncodingMode,
) -> SearchResult<Cow<'a, str>> {
    match encoding_mode {
        EncodingMode::FailFast => std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| SearchError::encoding_error(path, line_number, e)),
        EncodingMode::Lossy => Ok(String::from_utf8_lossy(bytes)),
    }
}

/// Scans single files for the search term
#[derive(Debug)]
pub struct FileProcessor {
    matcher: TermMatcher,
    metrics: SearchMetrics,
    encoding_mode: EncodingMode,
}

impl FileProcessor {
    /// Creates a new FileProcessor with the given term matcher
    pub fn new(matcher: TermMatcher, encoding_mode: EncodingMode) -> Self {
        Self {
            matcher,
            metrics: SearchMetrics::new(),
            encoding_mode,
        }
    }

    /// Gets the run metrics
    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    pub fn matcher(&self) -> &TermMatcher {
        &self.matcher
    }

    /// Appends the occurrences on one raw line; returns whether bytes were replaced
    fn scan_line(
        &self,
        path: &Path,
        line_number: usize,
        raw: &[u8],
        occurrences: &mut Vec<Occurrence>,
    ) -> SearchResult<bool> {
        let line = decode_line(trim_line_ending(raw), path, line_number, self.encoding_mode)?;
        occurrences.extend(
            self.matcher
                .find_columns(&line)
                .map(|column| Occurrence::new(line_number, column)),
        );
        Ok(matches!(line, Cow::Owned(_)))
    }

    fn finish(&self, path: &Path, occurrences: Vec<Occurrence>, replaced: bool) -> FileResult {
        if replaced {
            warn!("Invalid UTF-8 replaced in file: {}", path.display());
        }
        trace!(
            "Found {} occurrences in file {}",
            occurrences.len(),
            path.display()
        );
        FileResult::new(path, occurrences)
    }

    /// Process a file using buffered line-by-line reading
    fn process_file_buffered(&self, path: &Path) -> SearchResult<FileResult> {
        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);

        let mut occurrences = Vec::new();
        let mut line_buffer = Vec::with_capacity(256);
        let mut line_number = 0;
        let mut replaced = false;

        loop {
            line_buffer.clear();
            let read = reader
                .read_until(b'\n', &mut line_buffer)
                .map_err(|e| SearchError::from_io(path, e))?;
            if read == 0 {
                break;
            }
            line_number += 1;
            replaced |= self.scan_line(path, line_number, &line_buffer, &mut occurrences)?;
        }

        Ok(self.finish(path, occurrences, replaced))
    }

    /// Process a file using memory mapping
    fn process_mmap_file(&self, path: &Path) -> SearchResult<FileResult> {
        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;

        // SAFETY: the map is read-only and dropped before this function returns
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| SearchError::from_io(path, e))?;

        let mut occurrences = Vec::new();
        let mut replaced = false;
        let mut lines = mmap.split(|&b| b == b'\n').peekable();
        let mut line_number = 0;

        while let Some(line) = lines.next() {
            // A trailing newline leaves an empty final piece that is not a line
            if line.is_empty() && lines.peek().is_none() {
                break;
            }
            line_number += 1;
            replaced |= self.scan_line(path, line_number, line, &mut occurrences)?;
        }

        Ok(self.finish(path, occurrences, replaced))
    }

    /// Processes a file and returns every occurrence of the term
    ///
    /// The result is returned even when nothing matched.
    pub fn process_file(&self, path: &Path) -> SearchResult<FileResult> {
        trace!("Processing file: {}", path.display());

        // Choose processing strategy based on file size
        match path.metadata() {
            Ok(metadata) => {
                let size = metadata.len();
                self.metrics.record_file_processing(size);

                if size >= LARGE_FILE_THRESHOLD {
                    self.process_mmap_file(path)
                } else {
                    self.process_file_buffered(path)
                }
            }
            Err(e) => {
                warn!("Failed to get metadata for {}: {}", path.display(), e);
                self.process_file_buffered(path)
            }
        }
    }
}
