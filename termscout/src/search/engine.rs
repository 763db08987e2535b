use dashmap::DashMap;
use rayon::ThreadPoolBuilder;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::cancel::CancellationToken;
use super::matcher::TermMatcher;
use super::processor::FileProcessor;
use crate::config::SearchConfig;
use crate::errors::{SearchError, SearchResult};
use crate::results::{FileResult, SearchReport, Warning};
use crate::walker::DirectoryWalker;

/// Where concurrent workers deposit their outcomes
///
/// Results go into a concurrent map, warnings behind a mutex. Nothing else is shared
/// mutably between workers.
#[derive(Debug, Default)]
struct AggregationBuffer {
    results: DashMap<PathBuf, FileResult>,
    warnings: Mutex<Vec<Warning>>,
    files_searched: AtomicUsize,
    skipped_by_cancel: AtomicBool,
}

impl AggregationBuffer {
    fn insert(&self, result: FileResult) {
        self.files_searched.fetch_add(1, Ordering::Relaxed);
        if result.is_empty() {
            return;
        }
        self.results.insert(result.path().to_path_buf(), result);
    }

    /// Notes that a dispatched file was dropped because the run was cancelled
    fn mark_skipped(&self) {
        self.skipped_by_cancel.store(true, Ordering::Relaxed);
    }

    fn warn(&self, warning: Warning) {
        match self.warnings.lock() {
            Ok(mut warnings) => warnings.push(warning),
            Err(poisoned) => poisoned.into_inner().push(warning),
        }
    }

    fn into_report(self) -> SearchReport {
        let mut report = SearchReport::new();
        report.truncated = self.skipped_by_cancel.into_inner();
        for (_, result) in self.results {
            report.add_file_result(result);
        }
        report.files_searched = self.files_searched.into_inner();
        report.warnings = self
            .warnings
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        report.sort();
        report
    }
}

/// Runs searches on a bounded worker pool
///
/// The walker runs on the calling thread and hands each candidate to the pool as soon as
/// it is found. Once the walk is exhausted the coordinator waits for every dispatched
/// scan, then sorts the collected results by path, so the report does not depend on the
/// order in which workers finish.
#[derive(Debug, Clone, Default)]
pub struct SearchCoordinator {
    cancel: CancellationToken,
}

impl SearchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `token` to stop the run early
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self { cancel: token }
    }

    /// Handle that cancels this coordinator's runs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Performs a concurrent search across the configured directories
    ///
    /// Only an invalid configuration is an error. Files and directories that cannot be
    /// read are reported as warnings in the returned report.
    pub fn run(&self, config: &SearchConfig) -> SearchResult<SearchReport> {
        config.validate()?;
        info!(
            "Starting search for '{}' in {} directories with {} workers",
            config.search_term,
            config.directories_to_search.len(),
            config.num_threads
        );

        let matcher = TermMatcher::new(&config.search_term)?;
        let processor = FileProcessor::new(matcher, config.encoding_mode);
        let metrics = processor.metrics().clone();

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.num_threads.get())
            .thread_name(|i| format!("termscout-worker-{}", i))
            .build()
            .map_err(|e| SearchError::config_error(format!("failed to start workers: {}", e)))?;

        let buffer = AggregationBuffer::default();
        let mut walker = DirectoryWalker::new(config).with_cancellation(self.cancel.clone());

        debug!("Walking and dispatching");
        pool.in_place_scope(|scope| {
            for candidate in walker.by_ref() {
                let path = match candidate {
                    Ok(path) => path,
                    Err(e) => {
                        warn!("Skipping during walk: {}", e);
                        metrics.record_skipped();
                        buffer.warn(walk_warning(config, &e));
                        continue;
                    }
                };

                metrics.record_candidate();
                let (processor, buffer, metrics) = (&processor, &buffer, &metrics);
                let cancel = &self.cancel;
                scope.spawn(move |_| {
                    if cancel.is_cancelled() {
                        buffer.mark_skipped();
                        return;
                    }
                    match processor.process_file(&path) {
                        Ok(result) => {
                            metrics.record_scanned();
                            buffer.insert(result);
                        }
                        Err(e) => {
                            warn!("Skipping {}: {}", path.display(), e);
                            metrics.record_skipped();
                            buffer.warn(Warning::from_error(&path, &e));
                        }
                    }
                });
            }
            debug!("Walk finished, draining workers");
        });

        // Only work that was actually dropped makes the report partial
        let mut report = buffer.into_report();
        if walker.was_interrupted() {
            report.truncated = true;
        }
        if report.truncated {
            warn!("Search cancelled, report is partial");
            for root in &config.directories_to_search {
                report.add_warning(Warning::new(root, "search cancelled"));
            }
            report.sort();
        }

        metrics.log_stats();
        info!(
            "Search complete. Found {} matches in {} files",
            report.total_matches, report.files_with_matches
        );

        Ok(report)
    }
}

/// Warning for a walk error that may not carry its own path
fn walk_warning(config: &SearchConfig, err: &SearchError) -> Warning {
    let fallback = config
        .directories_to_search
        .first()
        .map(PathBuf::as_path)
        .unwrap_or_else(|| Path::new("."));
    Warning::from_error(fallback, err)
}

/// Performs a concurrent search with a fresh coordinator
pub fn search(config: &SearchConfig) -> SearchResult<SearchReport> {
    SearchCoordinator::new().run(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Occurrence;
    use std::num::NonZeroUsize;
    use tempfile::tempdir;

    #[test]
    fn test_search_counts() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("test.txt"), "test line\nTEST line 2\n").unwrap();
        std::fs::write(dir.path().join("other.txt"), "nothing here\n").unwrap();

        let config = SearchConfig {
            num_threads: NonZeroUsize::new(1).unwrap(),
            ..SearchConfig::new("test", vec![dir.path().to_path_buf()])
        };

        let report = search(&config).unwrap();
        assert_eq!(report.files_searched, 2);
        assert_eq!(report.files_with_matches, 1);
        assert_eq!(report.total_matches, 2);
        assert!(report.warnings.is_empty());
        assert!(!report.truncated);

        let result = report.file_result(&dir.path().join("test.txt")).unwrap();
        assert_eq!(
            result.occurrences(),
            &[Occurrence::new(1, 1), Occurrence::new(2, 1)]
        );
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let dir = tempdir().unwrap();
        let config = SearchConfig::new("", vec![dir.path().to_path_buf()]);
        assert!(matches!(search(&config), Err(SearchError::ConfigError(_))));
    }

    #[test]
    fn test_cancelled_run_is_truncated() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "api\n").unwrap();
        let config = SearchConfig::new("api", vec![dir.path().to_path_buf()]);

        let coordinator = SearchCoordinator::new();
        coordinator.cancellation_token().cancel();

        let report = coordinator.run(&config).unwrap();
        assert!(report.truncated);
        assert!(report.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].reason, "search cancelled");
    }

    #[test]
    fn test_late_cancel_does_not_truncate() {
        let buffer = AggregationBuffer::default();
        buffer.insert(FileResult::new("a.txt", vec![Occurrence::new(1, 1)]));
        let report = buffer.into_report();
        assert!(!report.truncated);

        let buffer = AggregationBuffer::default();
        buffer.insert(FileResult::new("a.txt", vec![Occurrence::new(1, 1)]));
        buffer.mark_skipped();
        let report = buffer.into_report();
        assert!(report.truncated);
        assert_eq!(report.files_with_matches, 1);
    }

    #[test]
    fn test_cancel_after_run_leaves_report_complete() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "api\n").unwrap();
        let config = SearchConfig::new("api", vec![dir.path().to_path_buf()]);

        let coordinator = SearchCoordinator::new();
        let report = coordinator.run(&config).unwrap();
        coordinator.cancellation_token().cancel();

        assert!(!report.truncated);
        assert!(report.warnings.is_empty());
        assert_eq!(report.files_with_matches, 1);
    }

    #[test]
    fn test_decode_failure_becomes_warning() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bad.txt"), b"api \xff\xfe\n").unwrap();
        std::fs::write(dir.path().join("good.txt"), "api\n").unwrap();
        let config = SearchConfig::new("api", vec![dir.path().to_path_buf()]);

        let report = search(&config).unwrap();
        assert_eq!(report.files_with_matches, 1);
        assert!(report.file_result(&dir.path().join("good.txt")).is_some());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].path, dir.path().join("bad.txt"));
        assert!(report.warnings[0].reason.contains("line 1"));
    }

    #[test]
    fn test_missing_root_becomes_warning() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "api\n").unwrap();
        let missing = dir.path().join("nope");
        let config = SearchConfig::new("api", vec![missing.clone(), dir.path().to_path_buf()]);

        let report = search(&config).unwrap();
        assert_eq!(report.files_with_matches, 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].path, missing);
    }
}
