use std::collections::hash_set;
use std::collections::HashSet;

use crate::entry::PathEntry;
use crate::errors::{SearchError, SearchResult};

/// Unordered, de-duplicated set of result paths.
///
/// Presentation order is the caller's concern; [`into_sorted`](Self::into_sorted)
/// exists for callers that want a stable listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    paths: HashSet<String>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a path, returning false if it was already present.
    pub fn insert(&mut self, path: String) -> bool {
        self.paths.insert(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> hash_set::Iter<'_, String> {
        self.paths.iter()
    }

    pub fn into_sorted(self) -> Vec<String> {
        let mut paths: Vec<String> = self.paths.into_iter().collect();
        paths.sort();
        paths
    }
}

impl FromIterator<String> for ResultSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResultSet {
    type Item = String;
    type IntoIter = hash_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a String;
    type IntoIter = hash_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// How a streaming walk ended.
#[derive(Debug, Default)]
pub struct WalkSummary {
    /// Entries handed to the sink.
    pub emitted: usize,
    /// First per-path error seen; later ones are only logged.
    pub first_error: Option<SearchError>,
    /// False when the walk was cancelled; the emitted entries are then partial.
    pub completed: bool,
}

/// Collected output of a walk.
#[derive(Debug, Default)]
pub struct WalkOutput {
    pub entries: Vec<PathEntry>,
    pub first_error: Option<SearchError>,
    pub completed: bool,
}

impl WalkOutput {
    pub(crate) fn from_summary(entries: Vec<PathEntry>, summary: WalkSummary) -> Self {
        Self {
            entries,
            first_error: summary.first_error,
            completed: summary.completed,
        }
    }

    /// Strict view: a cancelled walk is [`SearchError::Cancelled`] and a
    /// recorded per-path error is returned instead of the partial entries.
    pub fn into_result(self) -> SearchResult<Vec<PathEntry>> {
        if !self.completed {
            return Err(SearchError::Cancelled);
        }
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(self.entries),
        }
    }
}

/// Output of the search executor.
#[derive(Debug, Default)]
pub struct SearchOutput {
    pub results: ResultSet,
    pub first_error: Option<SearchError>,
    pub completed: bool,
}

impl SearchOutput {
    /// Strict view, same rules as [`WalkOutput::into_result`].
    pub fn into_result(self) -> SearchResult<ResultSet> {
        if !self.completed {
            return Err(SearchError::Cancelled);
        }
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(self.results),
        }
    }
}
