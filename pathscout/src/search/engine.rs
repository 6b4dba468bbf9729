use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::HashSet;
use tracing::{debug, info, trace, warn};

use super::matcher::Matcher;
use crate::cancel::CancellationToken;
use crate::config::FilterOptions;
use crate::entry::PathEntry;
use crate::errors::SearchResult;
use crate::filters::FilterPipeline;
use crate::metrics::SearchMetrics;
use crate::pool::WorkerPool;
use crate::results::{ResultSet, SearchOutput};

/// Applies the primary pattern and the filter pipeline to walked entries on a
/// pool of workers.
///
/// Workers only receive entries and send back results; both de-duplication
/// sets live on the calling thread.
#[derive(Debug)]
pub struct SearchExecutor {
    matcher: Matcher,
    pipeline: FilterPipeline,
    cancel: CancellationToken,
    metrics: SearchMetrics,
}

impl SearchExecutor {
    /// Validates `options` and compiles the pattern and exclude globs, so
    /// every configuration error surfaces before any entry is looked at.
    pub fn new(pattern: &str, options: &FilterOptions, metrics: &SearchMetrics) -> SearchResult<Self> {
        options.validate()?;
        let matcher = Matcher::from_options(pattern, options, metrics)?;
        let pipeline = FilterPipeline::new(options)?;
        debug!("Compiled pattern '{}' with filters {:?}", pattern, pipeline);
        Ok(Self {
            matcher,
            pipeline,
            cancel: CancellationToken::new(),
            metrics: metrics.clone(),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the search over `entries`. Entries with the same identity are
    /// processed once; results with the same path are reported once.
    pub fn execute<I>(&self, entries: I, pool: &WorkerPool) -> SearchOutput
    where
        I: IntoIterator<Item = PathEntry>,
    {
        let mut seen = HashSet::new();
        let work: Vec<PathEntry> = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.key().to_string()))
            .collect();
        drop(seen);

        info!(
            "Searching {} entries for '{}' with {} workers",
            work.len(),
            self.matcher.pattern(),
            pool.size()
        );

        let mut output = SearchOutput::default();
        if work.is_empty() || self.cancel.is_cancelled() {
            output.completed = !self.cancel.is_cancelled();
            return output;
        }

        // Every entry yields at most one message, so neither queue can fill.
        let capacity = work.len();
        let workers = pool.size().min(capacity);
        let (work_tx, work_rx) = bounded::<PathEntry>(capacity);
        for entry in work {
            if work_tx.send(entry).is_err() {
                break;
            }
        }
        drop(work_tx);

        let (result_tx, result_rx) = bounded::<SearchResult<String>>(capacity);
        let mut results = ResultSet::new();
        let mut first_error = None;

        pool.scoped(|scope| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move |_| self.worker(work_rx, result_tx));
            }
            drop(result_tx);

            for message in result_rx.iter() {
                match message {
                    Ok(path) => {
                        if !results.insert(path) {
                            trace!("Dropped duplicate result");
                        }
                    }
                    Err(e) => {
                        warn!("Skipping entry: {}", e);
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }
        });

        output.results = results;
        output.first_error = first_error;
        output.completed = !self.cancel.is_cancelled();
        info!(
            "Search finished: {} results, completed: {}",
            output.results.len(),
            output.completed
        );
        output
    }

    fn worker(&self, work_rx: Receiver<PathEntry>, result_tx: Sender<SearchResult<String>>) {
        let match_all = self.matcher.is_match_all();
        for entry in work_rx.iter() {
            if self.cancel.is_cancelled() {
                break;
            }
            if !match_all && !self.matcher.matches(entry.relative()) {
                continue;
            }
            let message = match self.pipeline.apply(&entry) {
                Ok(Some(path)) => {
                    self.metrics.record_match();
                    Ok(path)
                }
                Ok(None) => continue,
                Err(e) => {
                    self.metrics.record_filter_error();
                    Err(e)
                }
            };
            if result_tx.send(message).is_err() {
                break;
            }
        }
    }
}

/// Compiles and runs one search with fresh metrics and no cancellation.
pub fn search<I>(
    pattern: &str,
    entries: I,
    options: &FilterOptions,
    pool: &WorkerPool,
) -> SearchResult<SearchOutput>
where
    I: IntoIterator<Item = PathEntry>,
{
    let executor = SearchExecutor::new(pattern, options, &SearchMetrics::new())?;
    Ok(executor.execute(entries, pool))
}
