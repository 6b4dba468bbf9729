use std::path::PathBuf;
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur while walking, matching or filtering
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid depth: {0}, must be -1 (unlimited) or a non-negative value")]
    InvalidDepth(i64),
    #[error("Invalid thread count: {requested}, must be between 1 and {max}")]
    InvalidThreadCount { requested: i64, max: usize },
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Conflicting options: {0}")]
    ConflictingOptions(String),
    #[error("Traversal error at {path}: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SearchError {
    /// Whitespace is collapsed so multi-line parser diagnostics (regex
    /// syntax errors draw a caret diagram) stay on one line.
    pub fn invalid_pattern(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self::InvalidPattern(msg.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    pub fn conflicting_options(msg: impl Into<String>) -> Self {
        Self::ConflictingOptions(msg.into())
    }

    pub fn traversal(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Traversal {
            path: path.into(),
            source,
        }
    }

    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Converts an error coming out of the `ignore` walker, keeping the path
    /// it happened at when the walker reported one.
    pub(crate) fn from_walk(err: ignore::Error, fallback: &std::path::Path) -> Self {
        match err {
            ignore::Error::WithPath { path, err } => match *err {
                ignore::Error::Io(io) => Self::traversal(path, io),
                other => Self::traversal(path, std::io::Error::other(other.to_string())),
            },
            ignore::Error::WithDepth { err, .. } => Self::from_walk(*err, fallback),
            ignore::Error::Loop { child, .. } => Self::traversal(
                child,
                std::io::Error::other("file system loop found"),
            ),
            ignore::Error::Io(io) => Self::traversal(fallback, io),
            other => Self::traversal(fallback, std::io::Error::other(other.to_string())),
        }
    }

    /// The path this error occurred at, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Traversal { path, .. } | Self::PathNotFound(path) => Some(path),
            _ => None,
        }
    }

    /// Whether this error was produced by validation before any work started.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidDepth(_)
                | Self::InvalidThreadCount { .. }
                | Self::InvalidPattern(_)
                | Self::ConflictingOptions(_)
        )
    }
}
