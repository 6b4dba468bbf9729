use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use crate::config::EntryType;
use crate::paths::{base_name, clean_path, depth_of};

/// Metadata of a path, read with `symlink_metadata` so links report as links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub is_dir: bool,
    pub is_symlink: bool,
    pub is_file: bool,
    pub size: u64,
    /// Unix permission bits; on other platforms `0o444` or `0o644` from the
    /// read-only flag.
    pub mode: u32,
    pub modified: Option<SystemTime>,
}

impl EntryMeta {
    fn from_metadata(meta: &fs::Metadata) -> Self {
        let file_type = meta.file_type();
        Self {
            is_dir: file_type.is_dir(),
            is_symlink: file_type.is_symlink(),
            is_file: file_type.is_file(),
            size: meta.len(),
            mode: mode_bits(meta),
            modified: meta.modified().ok(),
        }
    }

    pub fn entry_type(&self) -> Option<EntryType> {
        if self.is_symlink {
            Some(EntryType::Symlink)
        } else if self.is_dir {
            Some(EntryType::Dir)
        } else if self.is_file {
            Some(EntryType::File)
        } else {
            None
        }
    }
}

#[cfg(unix)]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// A path discovered by the walker.
///
/// The metadata is fetched at most once, on first use, and shared by every
/// later stage. Two entries are equal when their cleaned paths are equal.
#[derive(Debug)]
pub struct PathEntry {
    path: PathBuf,
    relative: PathBuf,
    key: String,
    depth: usize,
    is_dir_hint: Option<bool>,
    meta: OnceLock<Option<EntryMeta>>,
}

impl PathEntry {
    /// Builds an entry for `path`, which must lie under `root`. Paths outside
    /// the root are kept whole as their own relative form.
    pub fn new(root: &Path, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let relative = clean_path(path.strip_prefix(root).unwrap_or(&path));
        let key = clean_path(&path).to_string_lossy().into_owned();
        let depth = depth_of(&relative);
        Self {
            path,
            relative,
            key,
            depth,
            is_dir_hint: None,
            meta: OnceLock::new(),
        }
    }

    /// Records the directory bit already known from the directory listing so
    /// that pruning decisions never need an extra `stat`.
    pub(crate) fn with_dir_hint(mut self, is_dir: bool) -> Self {
        self.is_dir_hint = Some(is_dir);
        self
    }

    /// Path as produced by the walk, usable for filesystem calls.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the traversal root.
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Cleaned path string; the identity of the entry.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> String {
        base_name(&self.path)
    }

    /// Separator count relative to the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Cached metadata, or `None` when it cannot be read.
    pub fn metadata(&self) -> Option<&EntryMeta> {
        self.meta
            .get_or_init(|| {
                fs::symlink_metadata(&self.path)
                    .ok()
                    .map(|m| EntryMeta::from_metadata(&m))
            })
            .as_ref()
    }

    pub fn is_dir(&self) -> bool {
        match self.is_dir_hint {
            Some(is_dir) => is_dir,
            None => self.metadata().is_some_and(|m| m.is_dir),
        }
    }
}

impl Clone for PathEntry {
    fn clone(&self) -> Self {
        let meta = OnceLock::new();
        if let Some(cached) = self.meta.get() {
            let _ = meta.set(*cached);
        }
        Self {
            path: self.path.clone(),
            relative: self.relative.clone(),
            key: self.key.clone(),
            depth: self.depth,
            is_dir_hint: self.is_dir_hint,
            meta,
        }
    }
}

impl PartialEq for PathEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PathEntry {}

impl Hash for PathEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
