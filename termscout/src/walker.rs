use ignore::{DirEntry, Walk, WalkBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::SearchConfig;
use crate::errors::{unify_path, SearchError, SearchResult};
use crate::filters::classify;
use crate::search::CancellationToken;

/// Removes `.` components without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// Directories whose subtrees are never entered
///
/// A directory is excluded when it equals an excluded path or lies below one. Paths are
/// compared component-wise in both their lexical and their canonical form, so `docs`,
/// `./docs` and an absolute spelling of the same directory all match.
#[derive(Debug, Default)]
pub struct ExcludedDirs {
    lexical: Vec<PathBuf>,
    canonical: Vec<PathBuf>,
}

impl ExcludedDirs {
    pub fn new(dirs: &[PathBuf]) -> Self {
        Self {
            lexical: dirs.iter().map(|d| normalize_lexically(d)).collect(),
            canonical: dirs
                .iter()
                .filter(|d| d.exists())
                .map(|d| unify_path(d))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lexical.is_empty()
    }

    pub fn matches(&self, dir: &Path) -> bool {
        if self.is_empty() {
            return false;
        }
        let lexical = normalize_lexically(dir);
        if self.lexical.iter().any(|ex| lexical.starts_with(ex)) {
            return true;
        }
        if self.canonical.is_empty() {
            return false;
        }
        let canonical = unify_path(dir);
        self.canonical.iter().any(|ex| canonical.starts_with(ex))
    }
}

/// Path of the entry an `ignore` error is about
fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        _ => None,
    }
}

fn convert_walk_error(err: ignore::Error, root: &Path) -> SearchError {
    let path = error_path(&err).unwrap_or(root).to_path_buf();
    match err.io_error() {
        Some(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
            SearchError::permission_denied(path)
        }
        Some(io) => SearchError::walk_error(path, io.to_string()),
        None => SearchError::walk_error(path, err.to_string()),
    }
}

/// Whether an entry is a regular file, or a link to one
///
/// Links to files are scanned even when links are not followed; only directory links are
/// governed by `follow_links`.
fn is_file_entry(entry: &DirEntry) -> bool {
    match entry.file_type() {
        Some(ft) if ft.is_file() => true,
        Some(ft) if ft.is_symlink() => match fs::metadata(entry.path()) {
            Ok(meta) => meta.is_file(),
            Err(e) => {
                debug!("Dangling link {}: {}", entry.path().display(), e);
                false
            }
        },
        _ => false,
    }
}

/// Lazily enumerates the files a search should scan
///
/// Roots are walked in configuration order, depth first, with directory entries sorted by
/// file name so that two walks over the same tree agree. Every file is yielded at most
/// once per walk, identified by its canonical path. Walk failures are yielded as errors
/// and the walk carries on with the next entry.
pub struct DirectoryWalker<'a> {
    config: &'a SearchConfig,
    roots: std::slice::Iter<'a, PathBuf>,
    current: Option<(Walk, &'a Path)>,
    excluded: Arc<ExcludedDirs>,
    visited: HashSet<PathBuf>,
    cancel: CancellationToken,
    interrupted: bool,
}

impl<'a> DirectoryWalker<'a> {
    pub fn new(config: &'a SearchConfig) -> Self {
        Self {
            config,
            roots: config.directories_to_search.iter(),
            current: None,
            excluded: Arc::new(ExcludedDirs::new(&config.exclude_directories)),
            visited: HashSet::new(),
            cancel: CancellationToken::new(),
            interrupted: false,
        }
    }

    /// Stops the walk once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Whether cancellation stopped the walk before every root was exhausted
    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }

    fn build_walk(&self, root: &Path) -> Walk {
        let excluded = Arc::clone(&self.excluded);
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .follow_links(self.config.follow_links)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                if is_dir && excluded.matches(entry.path()) {
                    debug!("Skipping excluded directory: {}", entry.path().display());
                    return false;
                }
                true
            });
        builder.build()
    }
}

impl Iterator for DirectoryWalker<'_> {
    type Item = SearchResult<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cancel.is_cancelled() {
                if self.current.is_some() || self.roots.len() > 0 {
                    self.interrupted = true;
                }
                self.current = None;
                return None;
            }

            if self.current.is_none() {
                let root = self.roots.next()?;
                if self.excluded.matches(root) {
                    debug!("Root {} is excluded", root.display());
                    continue;
                }
                debug!("Walking {}", root.display());
                self.current = Some((self.build_walk(root), root.as_path()));
                continue;
            }

            let (next, root) = match self.current.as_mut() {
                Some((walk, root)) => (walk.next(), *root),
                None => continue,
            };

            let entry = match next {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => return Some(Err(convert_walk_error(err, root))),
                None => {
                    self.current = None;
                    continue;
                }
            };

            if !is_file_entry(&entry) {
                continue;
            }
            if !self.visited.insert(unify_path(entry.path())) {
                trace!("Already visited: {}", entry.path().display());
                continue;
            }
            match classify(entry.path(), self.config) {
                Ok(true) => return Some(Ok(entry.into_path())),
                Ok(false) => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Walks every configured root and returns the candidate paths
///
/// Convenience wrapper around [`DirectoryWalker`] for callers that want the whole list.
pub fn walk(config: &SearchConfig) -> DirectoryWalker<'_> {
    DirectoryWalker::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn candidates(config: &SearchConfig) -> Vec<PathBuf> {
        walk(config).filter_map(Result::ok).collect()
    }

    #[test]
    fn test_walk_is_sorted_and_skips_excluded_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("docs/deep")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("docs/c.txt"), "c").unwrap();
        fs::write(root.join("docs/deep/d.txt"), "d").unwrap();
        fs::write(root.join("src/e.txt"), "e").unwrap();

        let config = SearchConfig {
            exclude_directories: vec![root.join("docs")],
            ..SearchConfig::new("x", vec![root.to_path_buf()])
        };

        assert_eq!(
            candidates(&config),
            vec![root.join("a.txt"), root.join("b.txt"), root.join("src/e.txt")]
        );
    }

    #[test]
    fn test_excluded_prefix_is_component_wise() {
        let excluded = ExcludedDirs::new(&[PathBuf::from("./docs")]);
        assert!(excluded.matches(Path::new("docs")));
        assert!(excluded.matches(Path::new("./docs/deep")));
        assert!(!excluded.matches(Path::new("docs2")));
        assert!(!excluded.matches(Path::new("src/docs")));
        assert!(!ExcludedDirs::default().matches(Path::new("docs")));
    }

    #[test]
    fn test_excluded_root_yields_nothing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let config = SearchConfig {
            exclude_directories: vec![dir.path().to_path_buf()],
            ..SearchConfig::new("x", vec![dir.path().to_path_buf()])
        };
        assert!(candidates(&config).is_empty());
    }

    #[test]
    fn test_roots_walked_in_order_without_duplicates() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("z")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("z/one.txt"), "1").unwrap();
        fs::write(root.join("a/two.txt"), "2").unwrap();

        let config = SearchConfig::new(
            "x",
            vec![root.join("z"), root.join("a"), root.join("z")],
        );
        assert_eq!(
            candidates(&config),
            vec![root.join("z/one.txt"), root.join("a/two.txt")]
        );
    }

    #[test]
    fn test_missing_root_is_an_error_not_a_panic() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let config = SearchConfig::new("x", vec![missing.clone()]);

        let items: Vec<_> = walk(&config).collect();
        assert_eq!(items.len(), 1);
        let err = items.into_iter().next().unwrap().unwrap_err();
        assert_eq!(err.path(), Some(missing.as_path()));
    }

    #[test]
    fn test_binary_and_filtered_files_are_not_candidates() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), "text").unwrap();
        fs::write(root.join("b.bin"), [0u8, 1, 2, 3]).unwrap();
        fs::write(root.join("c.json"), "{}").unwrap();

        let config = SearchConfig {
            exclude_file_types: vec!["json".to_string()],
            ..SearchConfig::new("x", vec![root.to_path_buf()])
        };
        assert_eq!(candidates(&config), vec![root.join("a.txt")]);
    }

    #[test]
    fn test_cancelled_walk_stops() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        let config = SearchConfig::new("x", vec![dir.path().to_path_buf()]);

        let token = CancellationToken::new();
        token.cancel();
        let mut walker = DirectoryWalker::new(&config).with_cancellation(token);
        assert!(walker.next().is_none());
        assert!(walker.was_interrupted());
    }

    #[test]
    fn test_cancel_after_exhausted_walk_is_not_an_interruption() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        let config = SearchConfig::new("x", vec![dir.path().to_path_buf()]);

        let token = CancellationToken::new();
        let mut walker = DirectoryWalker::new(&config).with_cancellation(token.clone());
        assert_eq!(walker.by_ref().filter_map(Result::ok).count(), 1);

        token.cancel();
        assert!(walker.next().is_none());
        assert!(!walker.was_interrupted());
    }

    #[cfg(unix)]
    #[test]
    fn test_links_to_files_are_scanned_without_following_links() {
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("real.txt"), "api here").unwrap();
        fs::create_dir_all(outside.path().join("linked_dir")).unwrap();
        fs::write(outside.path().join("linked_dir/inner.txt"), "api").unwrap();

        let dir = tempdir().unwrap();
        let root = dir.path();
        std::os::unix::fs::symlink(outside.path().join("real.txt"), root.join("link.txt")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("real.txt"), root.join("link2.txt")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("linked_dir"), root.join("dir_link")).unwrap();
        std::os::unix::fs::symlink(root.join("missing.txt"), root.join("dangling.txt")).unwrap();

        let config = SearchConfig::new("x", vec![root.to_path_buf()]);
        assert!(!config.follow_links);

        // Both links resolve to one file; the directory link is not entered
        assert_eq!(candidates(&config), vec![root.join("link.txt")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/file.txt"), "f").unwrap();
        std::os::unix::fs::symlink(root, root.join("sub/loop")).unwrap();

        let config = SearchConfig {
            follow_links: true,
            ..SearchConfig::new("x", vec![root.to_path_buf()])
        };
        let items: Vec<_> = walk(&config).collect();
        let files: Vec<_> = items.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(files, vec![&root.join("sub/file.txt")]);
        assert!(items.iter().any(|r| r.is_err()), "loop should be reported");
    }
}
