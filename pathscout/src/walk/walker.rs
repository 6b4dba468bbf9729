use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::ignore_rules::{IgnoreCache, IgnoreResolver};
use crate::cancel::CancellationToken;
use crate::config::TraversalConfig;
use crate::entry::PathEntry;
use crate::errors::{SearchError, SearchResult};
use crate::metrics::SearchMetrics;
use crate::paths::clean_path;
use crate::pool::WorkerPool;
use crate::results::{WalkOutput, WalkSummary};

/// Levels the coordinator may list itself before handing seeds to workers.
const SEED_LEVELS: usize = 3;

/// Capacity of the stream from workers to the coordinator.
const OUTPUT_CAPACITY: usize = 1024;

/// How long a blocked send waits before re-checking for cancellation.
const SEND_SLICE: Duration = Duration::from_millis(50);

/// A directory one worker walks depth-first.
#[derive(Debug)]
struct Seed {
    path: PathBuf,
    /// Separator depth of the seed directory itself.
    depth: usize,
}

enum WalkMessage {
    Entry(PathEntry),
    Error(SearchError),
}

/// Depth-bounded parallel directory walker.
///
/// The coordinator lists the first levels of the tree breadth-first until it
/// holds enough directories to keep every worker busy, then each worker walks
/// one seed at a time depth-first. Entries are streamed to the caller on the
/// coordinating thread.
#[derive(Debug)]
pub struct Walker {
    config: TraversalConfig,
    resolver: Arc<IgnoreResolver>,
    cancel: CancellationToken,
    metrics: SearchMetrics,
}

impl Walker {
    pub fn new(config: TraversalConfig) -> Self {
        Self::with_cache(config, Arc::new(IgnoreCache::new()))
    }

    /// Uses `cache` for ignore-file patterns, so several walks can share parses.
    pub fn with_cache(config: TraversalConfig, cache: Arc<IgnoreCache>) -> Self {
        let resolver = Arc::new(IgnoreResolver::new(&config.root, cache));
        Self {
            config,
            resolver,
            cancel: CancellationToken::new(),
            metrics: SearchMetrics::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_metrics(mut self, metrics: SearchMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Walks the tree, collecting every entry.
    pub fn walk(&self, pool: &WorkerPool) -> WalkOutput {
        let mut entries = Vec::new();
        let summary = self.run(pool, |entry| entries.push(entry));
        WalkOutput::from_summary(entries, summary)
    }

    /// Walks the tree, handing each entry to `sink` as soon as it is found.
    ///
    /// `sink` runs on the calling thread. Per-path errors are skipped; the
    /// first one is returned in the summary.
    pub fn run<F>(&self, pool: &WorkerPool, mut sink: F) -> WalkSummary
    where
        F: FnMut(PathEntry),
    {
        info!(
            "Walking {} (max depth {:?}, {} workers)",
            self.config.root.display(),
            self.config.max_depth,
            pool.size()
        );

        let mut summary = WalkSummary::default();
        let seeds = self.seed(pool.size(), &mut sink, &mut summary);
        debug!("Seeded {} directories for workers", seeds.len());

        if !seeds.is_empty() && !self.cancel.is_cancelled() {
            self.drain_seeds(pool, seeds, &mut sink, &mut summary);
        }

        summary.completed = !self.cancel.is_cancelled();
        info!(
            "Walk finished: {} entries, completed: {}",
            summary.emitted, summary.completed
        );
        summary
    }

    /// Lists the top of the tree on the calling thread, emitting what it finds,
    /// and returns the directories left for the workers.
    fn seed<F>(&self, workers: usize, sink: &mut F, summary: &mut WalkSummary) -> Vec<Seed>
    where
        F: FnMut(PathEntry),
    {
        let mut frontier = vec![Seed {
            path: self.config.root.clone(),
            depth: 0,
        }];
        let mut root_level = true;

        for level in 0..SEED_LEVELS {
            if self.cancel.is_cancelled() {
                return Vec::new();
            }
            if !root_level && frontier.len() >= workers {
                break;
            }

            let mut next = Vec::new();
            for dir in frontier {
                if self.cancel.is_cancelled() {
                    return Vec::new();
                }
                // The root's children sit at depth 0.
                let child_depth = if root_level { 0 } else { dir.depth + 1 };
                for entry in self.list_dir(&dir.path, summary) {
                    if entry.is_dir() && self.descends_into(child_depth) {
                        next.push(Seed {
                            path: entry.path().to_path_buf(),
                            depth: child_depth,
                        });
                    }
                    summary.emitted += 1;
                    sink(entry);
                }
            }
            trace!("Seed level {} produced {} directories", level, next.len());
            frontier = next;
            root_level = false;
            if frontier.is_empty() {
                break;
            }
        }
        frontier
    }

    /// Reads one directory on the coordinator, applying hidden/ignored rules.
    fn list_dir(&self, dir: &Path, summary: &mut WalkSummary) -> Vec<PathEntry> {
        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(e) => {
                self.record_error(summary, SearchError::traversal(dir, e));
                return Vec::new();
            }
        };
        self.metrics.record_directory_read();

        let mut entries = Vec::new();
        for dirent in read_dir {
            let dirent = match dirent {
                Ok(dirent) => dirent,
                Err(e) => {
                    self.record_error(summary, SearchError::traversal(dir, e));
                    continue;
                }
            };
            let path = dirent.path();
            let is_dir = match dirent.file_type() {
                Ok(file_type) => file_type.is_dir(),
                Err(e) => {
                    self.record_error(summary, SearchError::traversal(&path, e));
                    continue;
                }
            };
            if !keep_path(&self.resolver, &self.config, &path) {
                trace!("Pruned {}", path.display());
                continue;
            }
            self.metrics.record_entry_walked();
            entries.push(PathEntry::new(&self.config.root, path).with_dir_hint(is_dir));
        }
        entries
    }

    fn descends_into(&self, dir_depth: usize) -> bool {
        self.config.max_depth.map_or(true, |max| dir_depth < max)
    }

    fn drain_seeds<F>(
        &self,
        pool: &WorkerPool,
        seeds: Vec<Seed>,
        sink: &mut F,
        summary: &mut WalkSummary,
    ) where
        F: FnMut(PathEntry),
    {
        let workers = pool.size().min(seeds.len());
        let (work_tx, work_rx) = bounded::<Seed>(seeds.len());
        for seed in seeds {
            // Sized to the seed count, so this never blocks.
            if work_tx.send(seed).is_err() {
                break;
            }
        }
        drop(work_tx);

        let (out_tx, out_rx) = bounded::<WalkMessage>(OUTPUT_CAPACITY);

        pool.scoped(|scope| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let out_tx = out_tx.clone();
                scope.spawn(move |_| self.worker(work_rx, out_tx));
            }
            drop(out_tx);

            for message in out_rx.iter() {
                if self.cancel.is_cancelled() {
                    break;
                }
                match message {
                    WalkMessage::Entry(entry) => {
                        summary.emitted += 1;
                        sink(entry);
                    }
                    WalkMessage::Error(e) => self.record_error(summary, e),
                }
            }
            // Blocked workers see the channel disconnect and stop.
            drop(out_rx);
        });
    }

    fn worker(&self, work_rx: Receiver<Seed>, out_tx: Sender<WalkMessage>) {
        while let Ok(seed) = work_rx.recv() {
            if self.cancel.is_cancelled() || !self.walk_seed(&seed, &out_tx) {
                break;
            }
        }
    }

    /// Walks one seed depth-first. Returns false once the output is closed or
    /// the walk was cancelled.
    fn walk_seed(&self, seed: &Seed, out_tx: &Sender<WalkMessage>) -> bool {
        let mut builder = WalkBuilder::new(&seed.path);
        builder
            .standard_filters(false)
            .follow_links(false)
            .max_depth(self.config.max_depth.map(|max| max - seed.depth));

        let resolver = Arc::clone(&self.resolver);
        let config = self.config.clone();
        builder.filter_entry(move |entry| {
            entry.depth() == 0 || keep_path(&resolver, &config, entry.path())
        });

        for result in builder.build() {
            if self.cancel.is_cancelled() {
                return false;
            }
            let message = match result {
                Ok(entry) if entry.depth() == 0 => continue,
                Ok(entry) => {
                    let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                    if is_dir {
                        self.metrics.record_directory_read();
                    }
                    self.metrics.record_entry_walked();
                    WalkMessage::Entry(
                        PathEntry::new(&self.config.root, entry.into_path()).with_dir_hint(is_dir),
                    )
                }
                Err(e) => {
                    self.metrics.record_walk_error();
                    WalkMessage::Error(SearchError::from_walk(e, &seed.path))
                }
            };
            if !send_cancellable(out_tx, message, &self.cancel) {
                return false;
            }
        }
        true
    }

    fn record_error(&self, summary: &mut WalkSummary, error: SearchError) {
        warn!("Skipping path: {}", error);
        if summary.first_error.is_none() {
            summary.first_error = Some(error);
        }
    }
}

/// Hidden and ignored entries are dropped, and directories among them pruned,
/// unless the configuration asks for them.
fn keep_path(resolver: &IgnoreResolver, config: &TraversalConfig, path: &Path) -> bool {
    if !config.include_hidden && resolver.is_hidden(path) {
        return false;
    }
    if !config.include_ignored && resolver.is_ignored(path) {
        return false;
    }
    true
}

/// Sends in short slices so a full channel never outlives cancellation.
fn send_cancellable<T>(tx: &Sender<T>, mut message: T, cancel: &CancellationToken) -> bool {
    loop {
        match tx.send_timeout(message, SEND_SLICE) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(returned)) => {
                if cancel.is_cancelled() {
                    return false;
                }
                message = returned;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

/// Validates the root, then walks it on a pool sized from the configuration.
pub fn walk(config: &TraversalConfig) -> SearchResult<WalkOutput> {
    config.validate()?;
    let pool = WorkerPool::new(config.max_workers)?;
    Ok(Walker::new(config.clone()).walk(&pool))
}

/// Keeps the entries whose root-relative path contains `pathname`. `"."`
/// keeps all.
pub fn narrow_to_pathname(entries: Vec<PathEntry>, pathname: &str) -> SearchResult<Vec<PathEntry>> {
    if pathname == "." {
        return Ok(entries);
    }
    let needle = clean_path(Path::new(pathname)).to_string_lossy().into_owned();
    let narrowed: Vec<PathEntry> = entries
        .into_iter()
        .filter(|e| e.relative().to_string_lossy().contains(needle.as_str()))
        .collect();
    if narrowed.is_empty() {
        return Err(SearchError::path_not_found(pathname));
    }
    Ok(narrowed)
}
