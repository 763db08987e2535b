use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use termscout::{
    config::ConfigOverrides, write_report_to_path, EncodingMode, ReportFormat, SearchConfig,
    SearchCoordinator, SearchReport,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Term to search for (case-insensitive, literal)
    term: Option<String>,

    /// Directory to search in (can be specified multiple times)
    #[arg(short = 'd', long = "dir")]
    dirs: Vec<PathBuf>,

    /// Directory to skip entirely (can be specified multiple times)
    #[arg(short = 'x', long = "exclude-dir")]
    exclude_dirs: Vec<PathBuf>,

    /// File extensions to include (e.g. txt,md,rs)
    #[arg(short = 'i', long = "include", value_delimiter = ',')]
    include: Vec<String>,

    /// File extensions to exclude, even when included
    #[arg(short = 'e', long = "exclude", value_delimiter = ',')]
    exclude: Vec<String>,

    /// Number of threads to use
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Where to write the report (default: search_results.csv)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Report format (csv|json)
    #[arg(long)]
    format: Option<ReportFormat>,

    /// Follow symbolic links
    #[arg(long)]
    follow_links: bool,

    /// How to handle invalid UTF-8 sequences (failfast|lossy)
    #[arg(long)]
    encoding: Option<EncodingMode>,

    /// Configuration file, layered over the global and local ones
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Show only statistics, not matching files
    #[arg(short, long)]
    stats: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        fn non_empty<T: Clone>(values: &[T]) -> Option<Vec<T>> {
            (!values.is_empty()).then(|| values.to_vec())
        }

        ConfigOverrides {
            search_term: self.term.clone(),
            directories_to_search: non_empty(&self.dirs),
            exclude_directories: non_empty(&self.exclude_dirs),
            include_file_types: non_empty(&self.include),
            exclude_file_types: non_empty(&self.exclude),
            num_threads: self.threads,
            follow_links: self.follow_links,
            encoding_mode: self.encoding,
            output_path: self.output.clone(),
            output_format: self.format,
            log_level: match self.verbose {
                0 => None,
                1 => Some("info".to_string()),
                _ => Some("debug".to_string()),
            },
        }
    }
}

fn main() -> Result<()> {
    let started = Instant::now();
    let cli = Cli::parse();

    let config = SearchConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?
        .merge_with_cli(cli.overrides());

    init_logging(&config.log_level);
    debug!("Resolved configuration: {:?}", config);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Searching for '{}'", config.search_term));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let report = SearchCoordinator::new().run(&config);
    spinner.finish_and_clear();
    let report = report?;

    print_search_results(&report, cli.stats);
    print_warnings(&report);

    write_report_to_path(&report, config.output_format, &config.output_path)
        .with_context(|| format!("failed to write report to {}", config.output_path.display()))?;

    println!(
        "Search completed. Results written to {}",
        config.output_path.display().to_string().blue()
    );
    println!(
        "Script execution time: {}",
        humantime::format_duration(truncate_to_millis(started.elapsed()))
    );
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn truncate_to_millis(elapsed: Duration) -> Duration {
    Duration::from_millis(elapsed.as_millis() as u64)
}

fn print_search_results(report: &SearchReport, stats_only: bool) {
    println!("Total searchable files: {}", report.files_searched);

    if !stats_only {
        for file_result in &report.file_results {
            println!(
                "{}: {}",
                file_result.path().display().to_string().blue(),
                file_result.total_count().to_string().green()
            );
        }
    }

    println!(
        "Found {} matches in {} files",
        report.total_matches, report.files_with_matches
    );
}

fn print_warnings(report: &SearchReport) {
    if report.truncated {
        eprintln!("{}", "Search was cancelled; results are partial".yellow());
    }
    for warning in &report.warnings {
        eprintln!(
            "{} {}: {}",
            "warning:".yellow().bold(),
            warning.path.display(),
            warning.reason
        );
    }
}
