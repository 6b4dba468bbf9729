//! Post-match filters.
//!
//! Filters run in a fixed order after the primary pattern: type, extension,
//! exclude, then the absolute-path rewrite. Each one only ever removes
//! entries; the rewrite is the single stage that changes the reported path.

use glob::Pattern;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tracing::trace;

use crate::config::{EntryType, FilterOptions};
use crate::entry::PathEntry;
use crate::errors::{SearchError, SearchResult};
use crate::paths::{base_name, clean_path, has_wildcard};

/// A stage that keeps or drops an entry.
pub trait EntryFilter: Send + Sync {
    /// Short name used in trace output.
    fn name(&self) -> &'static str;

    fn keep(&self, entry: &PathEntry) -> bool;
}

/// Keeps entries whose on-disk type is the requested one. Links are not
/// followed; entries whose metadata cannot be read are dropped.
#[derive(Debug, Clone, Copy)]
pub struct TypeFilter(pub EntryType);

impl EntryFilter for TypeFilter {
    fn name(&self) -> &'static str {
        "type"
    }

    fn keep(&self, entry: &PathEntry) -> bool {
        entry
            .metadata()
            .and_then(|meta| meta.entry_type())
            .is_some_and(|found| found == self.0)
    }
}

/// Keeps entries whose base name ends in `.<ext>`, compared case-sensitively.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extension: String,
}

impl ExtensionFilter {
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }
}

/// Suffix after the last `.` of the base name.
pub fn extension_of(path: &Path) -> Option<String> {
    let name = base_name(path);
    name.rfind('.').map(|idx| name[idx + 1..].to_string())
}

impl EntryFilter for ExtensionFilter {
    fn name(&self) -> &'static str {
        "extension"
    }

    fn keep(&self, entry: &PathEntry) -> bool {
        extension_of(entry.relative()).is_some_and(|ext| ext == self.extension)
    }
}

/// One compiled exclude pattern.
#[derive(Debug, Clone)]
pub struct ExcludeRule {
    glob: Pattern,
    /// Wildcard-free patterns also exclude everything below them.
    prefix: Option<PathBuf>,
    /// Patterns with a separator are also tried against the whole relative path.
    full_path: bool,
}

impl ExcludeRule {
    pub fn new(pattern: &str) -> SearchResult<Self> {
        if pattern.is_empty() {
            return Err(SearchError::invalid_pattern("exclude pattern must not be empty"));
        }
        let glob = Pattern::new(pattern).map_err(|e| {
            SearchError::invalid_pattern(format!("exclude pattern {pattern}: {e}"))
        })?;
        let prefix = (!has_wildcard(pattern)).then(|| clean_path(Path::new(pattern)));
        Ok(Self {
            glob,
            prefix,
            full_path: pattern.contains('/'),
        })
    }

    /// Checks a path relative to the traversal root.
    pub fn matches(&self, relative: &Path) -> bool {
        if self.glob.matches(&base_name(relative)) {
            return true;
        }
        if let Some(prefix) = &self.prefix {
            if relative.starts_with(prefix) {
                return true;
            }
        }
        self.full_path && self.glob.matches_path(relative)
    }
}

/// Drops entries matched by any exclude pattern.
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    rules: Vec<ExcludeRule>,
}

impl ExcludeFilter {
    /// Compiles every pattern up front; the first invalid one is an error.
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a String>) -> SearchResult<Self> {
        let rules = patterns
            .into_iter()
            .map(|p| ExcludeRule::new(p))
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_excluded(&self, relative: &Path) -> bool {
        self.rules.iter().any(|rule| rule.matches(relative))
    }
}

impl EntryFilter for ExcludeFilter {
    fn name(&self) -> &'static str {
        "exclude"
    }

    fn keep(&self, entry: &PathEntry) -> bool {
        !self.is_excluded(entry.relative())
    }
}

/// Absolute form of `path` without resolving links. Directories get a
/// trailing separator.
pub fn absolute_display(path: &Path, is_dir: bool) -> std::io::Result<String> {
    let absolute = clean_path(&std::path::absolute(path)?);
    let mut rendered = absolute.to_string_lossy().into_owned();
    if is_dir && !rendered.ends_with(MAIN_SEPARATOR) {
        rendered.push(MAIN_SEPARATOR);
    }
    Ok(rendered)
}

/// The filter stages of one search, built once and shared by every worker.
pub struct FilterPipeline {
    stages: Vec<Box<dyn EntryFilter>>,
    absolute_path: bool,
}

impl FilterPipeline {
    /// Builds the stages `options` asks for. Exclude patterns are compiled
    /// here so a bad one fails before any work starts.
    pub fn new(options: &FilterOptions) -> SearchResult<Self> {
        let mut stages: Vec<Box<dyn EntryFilter>> = Vec::new();
        if let Some(entry_type) = options.type_filter {
            stages.push(Box::new(TypeFilter(entry_type)));
        }
        if let Some(extension) = &options.extension_filter {
            stages.push(Box::new(ExtensionFilter::new(extension)));
        }
        let excludes = ExcludeFilter::new(&options.exclude_globs)?;
        if !excludes.is_empty() {
            stages.push(Box::new(excludes));
        }
        Ok(Self {
            stages,
            absolute_path: options.absolute_path,
        })
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage on `entry` and renders the surviving path.
    ///
    /// `Ok(None)` means the entry was filtered out. An error means the entry
    /// survived the filters but its absolute form could not be computed.
    pub fn apply(&self, entry: &PathEntry) -> SearchResult<Option<String>> {
        if let Some(stage) = self.stages.iter().find(|s| !s.keep(entry)) {
            trace!("{} dropped by {} filter", entry.key(), stage.name());
            return Ok(None);
        }
        if !self.absolute_path {
            return Ok(Some(entry.key().to_string()));
        }
        absolute_display(entry.path(), entry.is_dir())
            .map(Some)
            .map_err(|e| SearchError::traversal(entry.path(), e))
    }
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterPipeline")
            .field("stages", &self.stage_names())
            .field("absolute_path", &self.absolute_path)
            .finish()
    }
}
