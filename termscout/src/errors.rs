/// This module defines the error type shared by every stage of a search.
///
/// # Fatal vs. Per-File Errors
///
/// Only configuration problems stop a run before it starts:
/// ```rust,ignore
/// match SearchCoordinator::new().run(&config) {
///     Ok(report) => // Report is complete, possibly with warnings,
///     Err(SearchError::ConfigError(msg)) => // Nothing was walked,
///     Err(e) => // Unexpected failure,
/// }
/// ```
///
/// Everything that goes wrong with a single file or directory is converted into a
/// [`Warning`](crate::results::Warning) at the worker boundary:
/// ```rust,ignore
/// match processor.process_file(&path) {
///     Ok(result) => buffer.insert(result),
///     Err(e) => buffer.warn(Warning::from_error(&path, &e)),
/// }
/// ```
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid UTF-8 in file {path} at line {line_number}: {source}")]
    EncodingError {
        path: PathBuf,
        line_number: usize,
        source: std::str::Utf8Error,
    },
    #[error("Failed to walk {path}: {message}")]
    WalkError { path: PathBuf, message: String },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Canonicalize the path and strip UNC prefixes so that
/// comparisons on Windows are consistent.
pub fn unify_path(original: &Path) -> PathBuf {
    let canonical = original
        .canonicalize()
        .unwrap_or_else(|_| original.to_path_buf());
    strip_unc_prefix(&canonical)
}

/// Strips the Windows UNC prefix (\\?\) from a path if present
fn strip_unc_prefix(p: &Path) -> PathBuf {
    let s = p.display().to_string();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        p.to_path_buf()
    }
}

impl SearchError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn encoding_error(
        path: impl Into<PathBuf>,
        line_number: usize,
        source: std::str::Utf8Error,
    ) -> Self {
        Self::EncodingError {
            path: path.into(),
            line_number,
            source,
        }
    }

    pub fn walk_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::WalkError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Maps an I/O failure on `path` onto the matching variant.
    ///
    /// A file that disappears between enumeration and scanning surfaces here as
    /// `FileNotFound`.
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }

    /// The path the error is about, when it carries one
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::FileNotFound(path) | Self::PermissionDenied(path) => Some(path.as_path()),
            Self::EncodingError { path, .. } | Self::WalkError { path, .. } => Some(path.as_path()),
            _ => None,
        }
    }

    /// Whether the error must abort a run instead of becoming a warning
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigError(_) | Self::ConfigLoad(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_creation() {
        let path = Path::new("test.txt");
        let err = SearchError::file_not_found(path);
        assert!(matches!(err, SearchError::FileNotFound(_)));

        let err = SearchError::permission_denied(path);
        assert!(matches!(err, SearchError::PermissionDenied(_)));

        let err = SearchError::walk_error(path, "loop detected");
        assert!(matches!(err, SearchError::WalkError { .. }));

        let err = SearchError::config_error("missing term");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = SearchError::config_error("Missing required field".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required field"
        );

        let err = SearchError::file_not_found("test.txt");
        assert_eq!(err.to_string(), "File not found: test.txt");

        let err = SearchError::walk_error("src", "permission denied");
        assert_eq!(err.to_string(), "Failed to walk src: permission denied");
    }

    #[test]
    fn test_encoding_error_reports_line() {
        let bytes = [b'o', b'k', 0xff];
        let source = std::str::from_utf8(&bytes).unwrap_err();
        let err = SearchError::encoding_error("data.txt", 7, source);
        assert!(err.to_string().contains("data.txt at line 7"));
        assert_eq!(err.path(), Some(Path::new("data.txt")));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_from_io_maps_kinds() {
        let path = Path::new("gone.txt");
        let err = SearchError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, SearchError::FileNotFound(_)));

        let err = SearchError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, SearchError::PermissionDenied(_)));

        let err = SearchError::from_io(path, io::Error::from(io::ErrorKind::Interrupted));
        assert!(matches!(err, SearchError::IoError(_)));
        assert_eq!(err.path(), None);
    }
}
