use rayon::{Scope, ThreadPool, ThreadPoolBuilder};
use std::num::NonZeroUsize;
use tracing::debug;

use crate::errors::{SearchError, SearchResult};

/// Fixed-size pool of worker threads shared by the walker and the search
/// executor of one run.
///
/// Workers are spawned as scoped jobs; the coordinating routine of each stage
/// keeps running on the calling thread while they drain their queue.
pub struct WorkerPool {
    pool: ThreadPool,
    size: NonZeroUsize,
}

impl WorkerPool {
    pub fn new(size: NonZeroUsize) -> SearchResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(size.get())
            .thread_name(|i| format!("pathscout-worker-{i}"))
            .build()
            .map_err(|e| SearchError::ThreadPool(e.to_string()))?;
        debug!("Built worker pool with {} threads", size);
        Ok(Self { pool, size })
    }

    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// Runs `coordinator` on the current thread with a scope on this pool.
    /// Returns once every job spawned into the scope has finished.
    pub(crate) fn scoped<'scope, F, R>(&self, coordinator: F) -> R
    where
        F: FnOnce(&Scope<'scope>) -> R,
    {
        self.pool.in_place_scope(coordinator)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("size", &self.size).finish()
    }
}
