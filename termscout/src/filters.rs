/// This module decides which files are worth scanning.
///
/// Admission runs in a fixed order, cheapest check first:
/// 1. **Excluded extensions** always win.
/// 2. **Included extensions**, when any are configured, must contain the file's extension.
/// 3. **Content sniffing** reads a bounded prefix and rejects binary-looking data.
///
/// The binary heuristic is the pure predicate [`is_probably_binary`] so its threshold can
/// be tuned and tested without touching the filesystem.
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{trace, warn};

use crate::config::SearchConfig;
use crate::errors::{SearchError, SearchResult};

/// Number of leading bytes inspected by the binary heuristic
pub const BINARY_SNIFF_LEN: usize = 8192;

/// Share of control bytes above which a prefix is considered binary
pub const BINARY_CONTROL_RATIO: f64 = 0.30;

/// Compares a path's extension against configured entries such as `".txt"` or `"TXT"`
fn extension_in(path: &Path, entries: &[String]) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => entries
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Checks the include/exclude extension lists; excluded extensions take precedence
pub fn has_valid_extension(path: &Path, include: &[String], exclude: &[String]) -> bool {
    if extension_in(path, exclude) {
        return false;
    }
    include.is_empty() || extension_in(path, include)
}

/// Heuristic: NUL bytes or too many control characters mean binary data
pub fn is_probably_binary(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    if bytes.contains(&0) {
        return true;
    }

    let control = bytes
        .iter()
        .filter(|&&b| {
            (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0b | 0x0c | 0x08 | 0x1b))
                || b == 0x7f
        })
        .count();

    control as f64 / bytes.len() as f64 > BINARY_CONTROL_RATIO
}

/// Reads up to [`BINARY_SNIFF_LEN`] bytes from the start of the file
fn read_prefix(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut prefix = Vec::with_capacity(BINARY_SNIFF_LEN);
    file.take(BINARY_SNIFF_LEN as u64).read_to_end(&mut prefix)?;
    Ok(prefix)
}

/// Classifies a file, surfacing read failures instead of swallowing them
///
/// The walker uses this so an unreadable file ends up as a warning in the report.
pub fn classify(path: &Path, config: &SearchConfig) -> SearchResult<bool> {
    if !has_valid_extension(path, &config.include_file_types, &config.exclude_file_types) {
        trace!("Skipping by extension: {}", path.display());
        return Ok(false);
    }

    let prefix = read_prefix(path).map_err(|e| SearchError::from_io(path, e))?;
    if is_probably_binary(&prefix) {
        trace!("Skipping binary file: {}", path.display());
        return Ok(false);
    }
    Ok(true)
}

/// Determines if a file should be scanned
///
/// Files that cannot be read here are rejected, never reported as errors.
pub fn should_scan(path: &Path, config: &SearchConfig) -> bool {
    match classify(path, config) {
        Ok(scan) => scan,
        Err(e) => {
            warn!("Unable to read {} due to {}", path.display(), e);
            false
        }
    }
}
