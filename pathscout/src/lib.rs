pub mod cancel;
pub mod config;
pub mod entry;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod paths;
pub mod pool;
pub mod results;
pub mod search;
pub mod walk;

use std::sync::Arc;
use tracing::info;

pub use cancel::CancellationToken;
pub use config::{
    validate_depth, validate_max_threads, CliOverrides, EntryType, FilterOptions, MatchKind,
    SearchConfig, TraversalConfig,
};
pub use entry::{EntryMeta, PathEntry};
pub use errors::{SearchError, SearchResult};
pub use metrics::SearchMetrics;
pub use pool::WorkerPool;
pub use results::{ResultSet, SearchOutput, WalkOutput};
pub use search::{search, Matcher, SearchExecutor, MATCH_ALL};
pub use walk::{narrow_to_pathname, walk, IgnoreCache, IgnoreResolver, Walker};

/// One complete invocation: what to look for and where.
#[derive(Debug, Clone)]
pub struct FindRequest {
    pub pattern: String,
    /// Keeps only entries whose path contains this string; `"."` keeps all.
    pub pathname: Option<String>,
    pub traversal: TraversalConfig,
    pub filters: FilterOptions,
}

impl FindRequest {
    pub fn new(pattern: impl Into<String>, traversal: TraversalConfig) -> Self {
        Self {
            pattern: pattern.into(),
            pathname: None,
            traversal,
            filters: FilterOptions::default(),
        }
    }
}

/// Walks and searches with a private ignore cache and no cancellation.
pub fn find(request: &FindRequest) -> SearchResult<SearchOutput> {
    find_with(request, &CancellationToken::new(), Arc::new(IgnoreCache::new()))
}

/// Validates everything, walks the tree and searches the walked entries on a
/// single worker pool.
///
/// The first error of the walk takes precedence over the first error of the
/// search. When `cancel` fires, the output is marked incomplete.
pub fn find_with(
    request: &FindRequest,
    cancel: &CancellationToken,
    cache: Arc<IgnoreCache>,
) -> SearchResult<SearchOutput> {
    let metrics = SearchMetrics::new();

    let executor = SearchExecutor::new(&request.pattern, &request.filters, &metrics)?
        .with_cancellation(cancel.clone());
    request.traversal.validate()?;
    let pool = WorkerPool::new(request.traversal.max_workers)?;

    info!(
        "Finding '{}' under {}",
        request.pattern,
        request.traversal.root.display()
    );

    let parses_before = cache.parse_count();
    let walker = Walker::with_cache(request.traversal.clone(), Arc::clone(&cache))
        .with_cancellation(cancel.clone())
        .with_metrics(metrics.clone());
    let walked = walker.walk(&pool);
    metrics.record_ignore_parses(cache.parse_count() - parses_before);

    let entries = match &request.pathname {
        Some(pathname) if walked.completed => narrow_to_pathname(walked.entries, pathname)?,
        // A partial walk proves nothing about absence.
        Some(pathname) => narrow_to_pathname(walked.entries, pathname).unwrap_or_default(),
        None => walked.entries,
    };

    let mut output = executor.execute(entries, &pool);
    output.completed &= walked.completed;
    if walked.first_error.is_some() {
        output.first_error = walked.first_error;
    }

    metrics.log_stats();
    Ok(output)
}
