use dashmap::DashMap;
use glob::Pattern;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use crate::paths::{base_name, clean_path, has_wildcard};

/// Glob selecting rule files in the traversal root.
const IGNORE_FILE_GLOB: &str = "*ignore";

/// Normalized patterns of parsed ignore files, keyed by ignore-file path.
///
/// Entries are never invalidated: ignore files are assumed static while a
/// search runs. Parsing is serialized behind one lock so a file is read at
/// most once even when many workers ask for it at the same time; lookups of
/// already parsed files do not take that lock.
#[derive(Debug, Default)]
pub struct IgnoreCache {
    patterns: DashMap<PathBuf, Arc<[String]>>,
    populate: Mutex<()>,
    parses: AtomicU64,
}

impl IgnoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the normalized patterns of `ignore_file`, parsing it on first use.
    /// Unreadable files contribute no patterns.
    pub fn patterns_for(&self, ignore_file: &Path) -> Arc<[String]> {
        if let Some(cached) = self.patterns.get(ignore_file) {
            return Arc::clone(cached.value());
        }

        let _guard = self
            .populate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(cached) = self.patterns.get(ignore_file) {
            return Arc::clone(cached.value());
        }

        let parsed: Arc<[String]> = match read_patterns(ignore_file) {
            Ok(lines) => lines.iter().filter_map(|l| normalize_pattern(l)).collect(),
            Err(e) => {
                debug!("Skipping unreadable ignore file {}: {}", ignore_file.display(), e);
                Arc::from(Vec::new())
            }
        };
        self.parses.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Cached {} ignore patterns from {}",
            parsed.len(),
            ignore_file.display()
        );
        self.patterns
            .insert(ignore_file.to_path_buf(), Arc::clone(&parsed));
        parsed
    }

    /// Number of ignore files parsed so far.
    pub fn parse_count(&self) -> u64 {
        self.parses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn read_patterns(path: &Path) -> std::io::Result<Vec<String>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        lines.push(line.to_string());
    }
    Ok(lines)
}

/// Normalizes one ignore-file line.
///
/// Patterns starting with `*` are kept verbatim. Others lose leading and
/// trailing separators; a pattern written as a directory (`dir/` or `dir/*`)
/// is reduced to its first component.
pub fn normalize_pattern(pattern: &str) -> Option<String> {
    if pattern.starts_with('*') {
        return Some(pattern.to_string());
    }

    let trimmed = pattern.trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let cleaned = clean_path(Path::new(trimmed));

    let normalized = if pattern.ends_with('/') || pattern.ends_with("/*") {
        cleaned
            .components()
            .next()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())?
    } else {
        cleaned.to_string_lossy().into_owned()
    };

    (normalized != ".").then_some(normalized)
}

/// Checks a root-relative path against one normalized pattern.
///
/// Wildcard-free patterns match as a whole-component prefix of the cleaned
/// path; every pattern is also tried as a glob against the base name.
pub fn matches_rule(relative: &Path, pattern: &str) -> bool {
    let path = clean_path(relative);
    if !has_wildcard(pattern) && path.starts_with(clean_path(Path::new(pattern))) {
        return true;
    }
    Pattern::new(pattern)
        .map(|p| p.matches(&base_name(&path)))
        .unwrap_or(false)
}

/// Answers hidden/ignored questions for the entries of one traversal.
#[derive(Debug)]
pub struct IgnoreResolver {
    root: PathBuf,
    ignore_files: Vec<PathBuf>,
    cache: Arc<IgnoreCache>,
}

impl IgnoreResolver {
    /// Discovers the `*ignore` files directly inside `root`. Their patterns are
    /// parsed lazily through `cache`, which the caller may share across runs.
    pub fn new(root: &Path, cache: Arc<IgnoreCache>) -> Self {
        let ignore_files = discover_ignore_files(root);
        debug!(
            "Found {} ignore files in {}",
            ignore_files.len(),
            root.display()
        );
        Self {
            root: root.to_path_buf(),
            ignore_files,
            cache,
        }
    }

    pub fn ignore_files(&self) -> &[PathBuf] {
        &self.ignore_files
    }

    /// True when the base name starts with `.` and the path is not the root.
    pub fn is_hidden(&self, path: &Path) -> bool {
        if clean_path(path) == clean_path(&self.root) {
            return false;
        }
        match path.file_name() {
            Some(name) => name.to_string_lossy().starts_with('.'),
            None => false,
        }
    }

    /// True when any rule of any discovered ignore file matches `path`.
    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.ignore_files.is_empty() {
            return false;
        }
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        for file in &self.ignore_files {
            let patterns = self.cache.patterns_for(file);
            if let Some(rule) = patterns.iter().find(|p| matches_rule(relative, p)) {
                trace!("{} ignored by rule '{}'", relative.display(), rule);
                return true;
            }
        }
        false
    }
}

fn discover_ignore_files(root: &Path) -> Vec<PathBuf> {
    let Ok(glob) = Pattern::new(IGNORE_FILE_GLOB) else {
        return Vec::new();
    };
    let Ok(read_dir) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = read_dir
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| glob.matches(&e.file_name().to_string_lossy()))
        .map(|e| e.path())
        .collect();
    files.sort();
    files
}
