use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::{SearchError, SearchResult};
use crate::report::ReportFormat;

/// Configuration for a search run.
///
/// A `SearchConfig` is built once at startup, validated by the coordinator, and then
/// only ever borrowed: the walker, the classifier and every worker read the same value.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag
/// 2. Local `.termscout.yaml` in the current directory
/// 3. Global `$HOME/.config/termscout/config.yaml`
///
/// # Configuration Format
///
/// ```yaml
/// # Literal term, matched case-insensitively
/// search_term: "api"
///
/// directories_to_search:
///   - "./src"
///   - "./docs"
///
/// # Subtrees that are never entered
/// exclude_directories:
///   - "./docs/generated"
///
/// # Empty means every extension
/// include_file_types: [".txt", ".md", "rs"]
/// exclude_file_types: ["json"]
///
/// # Worker count (default: CPU cores)
/// num_threads: 4
///
/// output_path: "search_results.csv"
/// output_format: "csv"
/// log_level: "info"
/// ```
///
/// Command-line values take precedence over file values, see [`SearchConfig::merge_with_cli`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// The literal term to look for
    #[serde(default)]
    pub search_term: String,

    /// Root directories, walked in this order
    #[serde(default = "default_directories")]
    pub directories_to_search: Vec<PathBuf>,

    /// Directories whose whole subtree is skipped
    #[serde(default)]
    pub exclude_directories: Vec<PathBuf>,

    /// Extensions to scan (e.g. [".txt", "md"]); empty admits every extension
    #[serde(default)]
    pub include_file_types: Vec<String>,

    /// Extensions never scanned, even when also included
    #[serde(default)]
    pub exclude_file_types: Vec<String>,

    /// Number of worker threads
    /// Defaults to number of CPU cores if not specified
    #[serde(default = "default_num_threads")]
    pub num_threads: NonZeroUsize,

    /// Follow symbolic links while walking
    #[serde(default)]
    pub follow_links: bool,

    /// How to handle invalid UTF-8 in scanned files
    #[serde(default)]
    pub encoding_mode: EncodingMode,

    /// Where the report is written
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    #[serde(default)]
    pub output_format: ReportFormat,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// How invalid UTF-8 sequences are handled while scanning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Skip the file with a warning
    #[default]
    FailFast,
    /// Replace invalid sequences with U+FFFD and keep scanning
    Lossy,
}

impl FromStr for EncodingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "failfast" | "fail-fast" => Ok(Self::FailFast),
            "lossy" => Ok(Self::Lossy),
            other => Err(format!(
                "unknown encoding mode '{}' (expected failfast or lossy)",
                other
            )),
        }
    }
}

impl fmt::Display for EncodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => write!(f, "failfast"),
            Self::Lossy => write!(f, "lossy"),
        }
    }
}

fn default_directories() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_num_threads() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_output_path() -> PathBuf {
    PathBuf::from("search_results.csv")
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Values supplied on the command line; `None` keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub search_term: Option<String>,
    pub directories_to_search: Option<Vec<PathBuf>>,
    pub exclude_directories: Option<Vec<PathBuf>>,
    pub include_file_types: Option<Vec<String>>,
    pub exclude_file_types: Option<Vec<String>>,
    pub num_threads: Option<NonZeroUsize>,
    pub follow_links: bool,
    pub encoding_mode: Option<EncodingMode>,
    pub output_path: Option<PathBuf>,
    pub output_format: Option<ReportFormat>,
    pub log_level: Option<String>,
}

impl SearchConfig {
    /// Creates a configuration searching `directories` for `term`, everything else defaulted
    pub fn new(term: impl Into<String>, directories: Vec<PathBuf>) -> Self {
        Self {
            search_term: term.into(),
            directories_to_search: directories,
            exclude_directories: Vec::new(),
            include_file_types: Vec::new(),
            exclude_file_types: Vec::new(),
            num_threads: default_num_threads(),
            follow_links: false,
            encoding_mode: EncodingMode::default(),
            output_path: default_output_path(),
            output_format: ReportFormat::default(),
            log_level: default_log_level(),
        }
    }

    /// Loads configuration from the default locations
    pub fn load() -> SearchResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus an optional explicit file
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("termscout/config.yaml")),
            Some(PathBuf::from(".termscout.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicit file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli: ConfigOverrides) -> Self {
        if let Some(term) = cli.search_term {
            self.search_term = term;
        }
        if let Some(dirs) = cli.directories_to_search {
            self.directories_to_search = dirs;
        }
        if let Some(dirs) = cli.exclude_directories {
            self.exclude_directories = dirs;
        }
        if let Some(types) = cli.include_file_types {
            self.include_file_types = types;
        }
        if let Some(types) = cli.exclude_file_types {
            self.exclude_file_types = types;
        }
        if let Some(threads) = cli.num_threads {
            self.num_threads = threads;
        }
        if cli.follow_links {
            self.follow_links = true;
        }
        if let Some(mode) = cli.encoding_mode {
            self.encoding_mode = mode;
        }
        if let Some(path) = cli.output_path {
            self.output_path = path;
        }
        if let Some(format) = cli.output_format {
            self.output_format = format;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Checks the values a run cannot start without
    pub fn validate(&self) -> SearchResult<()> {
        if self.search_term.is_empty() {
            return Err(SearchError::config_error("search term must not be empty"));
        }
        if self.directories_to_search.is_empty() {
            return Err(SearchError::config_error(
                "at least one directory to search is required",
            ));
        }
        if let Some(ext) = self
            .include_file_types
            .iter()
            .chain(&self.exclude_file_types)
            .find(|ext| ext.trim_start_matches('.').is_empty())
        {
            return Err(SearchError::config_error(format!(
                "invalid file type '{}'",
                ext
            )));
        }
        Ok(())
    }
}
