/// This module implements the concurrent scanning pipeline.
///
/// # Pipeline
///
/// ```text
/// DirectoryWalker ──paths──▶ rayon pool (num_threads) ──FileResult──▶ AggregationBuffer
///   (caller thread)            FileProcessor per path                 sorted into SearchReport
/// ```
///
/// 1. **Walking** happens on the thread that called [`SearchCoordinator::run`]; every
///    candidate is spawned onto the pool as soon as it is found.
/// 2. **Scanning** reads one file per task, line by line, and records each occurrence
///    with its 1-based line and character column.
/// 3. **Aggregation** is the only shared mutable state; once every task has finished the
///    results are sorted by path.
///
/// # Usage
///
/// ```rust,ignore
/// let config = SearchConfig::new("api", vec![PathBuf::from(".")]);
/// let report = search(&config)?;
/// for file in &report.file_results {
///     println!("{}: {}", file.path().display(), file.total_count());
/// }
/// ```
pub mod cancel;
pub mod engine;
pub mod matcher;
pub mod processor;

pub use cancel::CancellationToken;
pub use engine::{search, SearchCoordinator};
pub use matcher::TermMatcher;
pub use processor::FileProcessor;
