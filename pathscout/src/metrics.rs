use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Counters describing one search run
#[derive(Debug, Clone)]
pub struct SearchMetrics {
    // Traversal metrics
    entries_walked: Arc<AtomicU64>,
    directories_read: Arc<AtomicU64>,
    walk_errors: Arc<AtomicU64>,
    ignore_parses: Arc<AtomicU64>,

    // Matching metrics
    entries_matched: Arc<AtomicU64>,
    filter_errors: Arc<AtomicU64>,

    // Pattern cache metrics
    cache_hits: Arc<AtomicU64>,
    cache_misses: Arc<AtomicU64>,
}

impl SearchMetrics {
    /// Creates a new SearchMetrics instance
    pub fn new() -> Self {
        Self {
            entries_walked: Arc::new(AtomicU64::new(0)),
            directories_read: Arc::new(AtomicU64::new(0)),
            walk_errors: Arc::new(AtomicU64::new(0)),
            ignore_parses: Arc::new(AtomicU64::new(0)),
            entries_matched: Arc::new(AtomicU64::new(0)),
            filter_errors: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_entry_walked(&self) {
        self.entries_walked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_directory_read(&self) {
        self.directories_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_walk_error(&self) {
        self.walk_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignore_parses(&self, parses: u64) {
        self.ignore_parses.fetch_add(parses, Ordering::Relaxed);
    }

    pub fn record_match(&self) {
        self.entries_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filter_error(&self) {
        self.filter_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a pattern cache lookup
    pub fn record_cache_operation(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Gets a snapshot of every counter
    pub fn get_stats(&self) -> SearchStats {
        SearchStats {
            entries_walked: self.entries_walked.load(Ordering::Relaxed),
            directories_read: self.directories_read.load(Ordering::Relaxed),
            walk_errors: self.walk_errors.load(Ordering::Relaxed),
            ignore_parses: self.ignore_parses.load(Ordering::Relaxed),
            entries_matched: self.entries_matched.load(Ordering::Relaxed),
            filter_errors: self.filter_errors.load(Ordering::Relaxed),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
        }
    }

    /// Logs current run statistics
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Search stats:\n\
             Entries walked: {}\n\
             Directories read: {}\n\
             Walk errors: {}\n\
             Ignore files parsed: {}\n\
             Entries matched: {}\n\
             Filter errors: {}\n\
             Pattern cache hits/misses: {}/{}",
            stats.entries_walked,
            stats.directories_read,
            stats.walk_errors,
            stats.ignore_parses,
            stats.entries_matched,
            stats.filter_errors,
            stats.cache_hits,
            stats.cache_misses
        );
    }
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`SearchMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub entries_walked: u64,
    pub directories_read: u64,
    pub walk_errors: u64,
    pub ignore_parses: u64,
    pub entries_matched: u64,
    pub filter_errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}
