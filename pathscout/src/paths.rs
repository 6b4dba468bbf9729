//! Lexical path helpers shared by the walker, the ignore rules and the filters.
//!
//! Nothing in here touches the filesystem.

use std::path::{Component, Path, PathBuf};

/// Lexically normalizes a path: drops `.` components, folds `..` into the
/// preceding normal component and collapses repeated separators. An empty
/// result becomes `.`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// The final component of `path` as a string, or the whole path if it has none.
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Number of separators in a root-relative path. Direct children of the root
/// sit at depth 0.
pub fn depth_of(relative: &Path) -> usize {
    relative
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
        .saturating_sub(1)
}

/// True if the string contains shell wildcard syntax.
pub fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}
