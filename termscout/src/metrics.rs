use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::search::processor::LARGE_FILE_THRESHOLD;

/// Tracks what a run did, shared by the walker side and every worker
#[derive(Debug, Clone)]
pub struct SearchMetrics {
    // Dispatch metrics
    candidates: Arc<AtomicU64>,
    files_scanned: Arc<AtomicU64>,
    files_skipped: Arc<AtomicU64>,

    // Read metrics
    bytes_scanned: Arc<AtomicU64>,
    buffered_files_processed: Arc<AtomicU64>,
    mmap_files_processed: Arc<AtomicU64>,
}

impl SearchMetrics {
    /// Creates a new SearchMetrics instance
    pub fn new() -> Self {
        Self {
            candidates: Arc::new(AtomicU64::new(0)),
            files_scanned: Arc::new(AtomicU64::new(0)),
            files_skipped: Arc::new(AtomicU64::new(0)),
            bytes_scanned: Arc::new(AtomicU64::new(0)),
            buffered_files_processed: Arc::new(AtomicU64::new(0)),
            mmap_files_processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a path handed to a worker
    pub fn record_candidate(&self) {
        self.candidates.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed scan
    pub fn record_scanned(&self) {
        self.files_scanned.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a path that ended up as a warning
    pub fn record_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records file processing type
    pub fn record_file_processing(&self, size: u64) {
        let total = self.bytes_scanned.fetch_add(size, Ordering::Relaxed) + size;
        if size >= LARGE_FILE_THRESHOLD {
            self.mmap_files_processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.buffered_files_processed
                .fetch_add(1, Ordering::Relaxed);
        }
        debug!("Reading {} bytes, total read: {} bytes", size, total);
    }

    /// Gets current statistics
    pub fn get_stats(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            candidates: self.candidates.load(Ordering::Relaxed),
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            buffered_files: self.buffered_files_processed.load(Ordering::Relaxed),
            mmap_files: self.mmap_files_processed.load(Ordering::Relaxed),
        }
    }

    /// Logs current statistics
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Search stats:\n\
             Candidate files: {}\n\
             Files scanned/skipped: {}/{}\n\
             Bytes scanned: {}\n\
             Files read (buffered/mmap): {}/{}",
            stats.candidates,
            stats.files_scanned,
            stats.files_skipped,
            stats.bytes_scanned,
            stats.buffered_files,
            stats.mmap_files
        );
    }
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub candidates: u64,
    pub files_scanned: u64,
    pub files_skipped: u64,
    pub bytes_scanned: u64,
    pub buffered_files: u64,
    pub mmap_files: u64,
}
