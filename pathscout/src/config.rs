use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::{SearchError, SearchResult};

/// Validates a depth bound. `-1` means unlimited and maps to `None`.
pub fn validate_depth(depth: i64) -> SearchResult<Option<usize>> {
    match depth {
        -1 => Ok(None),
        d if d >= 0 => Ok(Some(d as usize)),
        d => Err(SearchError::InvalidDepth(d)),
    }
}

/// Validates a requested thread count against the available cores.
pub fn validate_max_threads(threads: i64) -> SearchResult<NonZeroUsize> {
    let max = num_cpus::get();
    if threads < 1 || threads as u64 > max as u64 {
        return Err(SearchError::InvalidThreadCount {
            requested: threads,
            max,
        });
    }
    NonZeroUsize::new(threads as usize).ok_or(SearchError::InvalidThreadCount {
        requested: threads,
        max,
    })
}

/// Clamps a thread count into `[1, available cores]`.
pub fn clamp_threads(threads: usize) -> NonZeroUsize {
    let clamped = threads.clamp(1, num_cpus::get().max(1));
    NonZeroUsize::new(clamped).unwrap_or(NonZeroUsize::MIN)
}

fn default_thread_count() -> NonZeroUsize {
    clamp_threads(num_cpus::get())
}

/// Parameters of one directory walk.
///
/// Built once from validated input; the walker never mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalConfig {
    /// Directory the walk starts from. Never reported itself.
    pub root: PathBuf,
    /// Deepest separator count reported, `None` for unlimited.
    pub max_depth: Option<usize>,
    /// Number of walker workers.
    pub max_workers: NonZeroUsize,
    /// Report entries whose name starts with `.`.
    pub include_hidden: bool,
    /// Report entries matched by `*ignore` files in the root.
    pub include_ignored: bool,
}

impl TraversalConfig {
    /// Unlimited depth, all cores, hidden and ignored entries suppressed.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_depth: None,
            max_workers: default_thread_count(),
            include_hidden: false,
            include_ignored: false,
        }
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_workers(mut self, max_workers: NonZeroUsize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    pub fn with_ignored(mut self, include_ignored: bool) -> Self {
        self.include_ignored = include_ignored;
        self
    }

    /// Checks that the root exists and is a directory.
    pub fn validate(&self) -> SearchResult<()> {
        match std::fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(SearchError::traversal(
                &self.root,
                std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SearchError::path_not_found(&self.root))
            }
            Err(e) => Err(SearchError::traversal(&self.root, e)),
        }
    }
}

/// How the primary pattern is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// Literal substring of the relative path or the base name.
    #[default]
    Substring,
    /// Regular expression against the relative path or the base name.
    Regex,
    /// Shell glob against the base name only.
    Glob,
}

impl MatchKind {
    /// Resolves the `--regex` / `--glob` flag pair.
    pub fn from_flags(regex: bool, glob: bool) -> SearchResult<Self> {
        match (regex, glob) {
            (true, true) => Err(SearchError::conflicting_options(
                "--regex and --glob cannot be used together",
            )),
            (true, false) => Ok(Self::Regex),
            (false, true) => Ok(Self::Glob),
            (false, false) => Ok(Self::Substring),
        }
    }
}

/// On-disk entry type used by the type filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    File,
    Dir,
    Symlink,
}

impl FromStr for EntryType {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" | "f" => Ok(Self::File),
            "dir" | "d" | "directory" => Ok(Self::Dir),
            "symlink" | "l" | "link" => Ok(Self::Symlink),
            other => Err(SearchError::config_error(format!(
                "invalid file type: {other} (expected file, dir or symlink)"
            ))),
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Dir => "dir",
            Self::Symlink => "symlink",
        };
        f.write_str(name)
    }
}

/// Everything the search stage needs beyond the pattern itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub match_kind: MatchKind,
    /// Only meaningful for substring matching. When false, both sides are
    /// folded to lowercase before comparing.
    pub case_sensitive: bool,
    /// Globs whose matches are dropped from the results.
    pub exclude_globs: BTreeSet<String>,
    pub type_filter: Option<EntryType>,
    /// Extension without the leading dot; a leading dot is tolerated.
    pub extension_filter: Option<String>,
    /// Rewrite results to absolute paths, directories with a trailing separator.
    pub absolute_path: bool,
}

impl FilterOptions {
    pub fn new(match_kind: MatchKind) -> Self {
        Self {
            match_kind,
            ..Self::default()
        }
    }

    /// Rejects option combinations that cannot be honored together.
    pub fn validate(&self) -> SearchResult<()> {
        if self.type_filter.is_some() && self.extension_filter.is_some() {
            return Err(SearchError::conflicting_options(
                "--file-type and --extension cannot be used together",
            ));
        }
        if self.match_kind != MatchKind::Substring
            && (self.case_sensitive
                || self.type_filter.is_some()
                || self.extension_filter.is_some())
        {
            return Err(SearchError::conflicting_options(
                "--regex and --glob are incompatible with --case-sensitive, --file-type, and --extension",
            ));
        }
        if let Some(ext) = &self.extension_filter {
            if ext.trim_start_matches('.').is_empty() {
                return Err(SearchError::config_error("extension filter is empty"));
            }
        }
        Ok(())
    }
}

/// Profile loaded from configuration files, overridable from the command line.
///
/// Locations, lowest precedence first:
/// 1. `$CONFIG_DIR/pathscout/config.yaml`
/// 2. `.pathscout.yaml` in the current directory
/// 3. A file passed with `--config`
///
/// ```yaml
/// max_depth: 4
/// thread_count: 8
/// include_hidden: false
/// include_ignored: false
/// exclude_patterns:
///   - "*.log"
///   - "target"
/// absolute_path: false
/// log_level: "info"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: i64,

    /// `None` uses every available core.
    #[serde(default)]
    pub thread_count: Option<i64>,

    #[serde(default)]
    pub include_hidden: bool,

    #[serde(default)]
    pub include_ignored: bool,

    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    #[serde(default)]
    pub absolute_path: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_depth() -> i64 {
    -1
}

pub fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            thread_count: None,
            include_hidden: false,
            include_ignored: false,
            exclude_patterns: Vec::new(),
            absolute_path: false,
            log_level: default_log_level(),
        }
    }
}

impl SearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> SearchResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus an explicit file.
    /// A missing explicit file is an error; missing default files are skipped.
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("pathscout/config.yaml")),
            Some(PathBuf::from(".pathscout.yaml")),
        ];
        for path in defaults.iter().flatten() {
            if path.is_file() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            if !path.is_file() {
                return Err(SearchError::config_error(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SearchError::config_error(e.to_string()))
    }

    /// Merges explicitly given CLI values over the file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(depth) = cli.max_depth {
            self.max_depth = depth;
        }
        if cli.thread_count.is_some() {
            self.thread_count = cli.thread_count;
        }
        if cli.include_hidden {
            self.include_hidden = true;
        }
        if cli.include_ignored {
            self.include_ignored = true;
        }
        if !cli.exclude_patterns.is_empty() {
            self.exclude_patterns.extend(cli.exclude_patterns);
        }
        if cli.absolute_path {
            self.absolute_path = true;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Validates the profile and turns it into a walk configuration.
    pub fn traversal_config(&self, root: impl Into<PathBuf>) -> SearchResult<TraversalConfig> {
        let max_depth = validate_depth(self.max_depth)?;
        let max_workers = match self.thread_count {
            Some(n) => validate_max_threads(n)?,
            None => default_thread_count(),
        };
        Ok(TraversalConfig {
            root: root.into(),
            max_depth,
            max_workers,
            include_hidden: self.include_hidden,
            include_ignored: self.include_ignored,
        })
    }
}

/// Values the command line may override. `None`/`false`/empty mean "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub max_depth: Option<i64>,
    pub thread_count: Option<i64>,
    pub include_hidden: bool,
    pub include_ignored: bool,
    pub exclude_patterns: Vec<String>,
    pub absolute_path: bool,
    pub log_level: Option<String>,
}
