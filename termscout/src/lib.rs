pub mod config;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod report;
pub mod results;
pub mod search;
pub mod walker;

pub use config::{EncodingMode, SearchConfig};
pub use errors::{SearchError, SearchResult};
pub use report::{write_report_to_path, ReportFormat};
pub use results::{FileResult, Occurrence, SearchReport, Warning};
pub use search::{search, CancellationToken, SearchCoordinator};
