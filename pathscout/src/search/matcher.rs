use dashmap::DashMap;
use glob::Pattern;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

use crate::config::{FilterOptions, MatchKind};
use crate::errors::{SearchError, SearchResult};
use crate::metrics::SearchMetrics;
use crate::paths::base_name;

/// Pattern that lists everything the walk produced.
pub const MATCH_ALL: &str = ".";

static PATTERN_CACHE: Lazy<DashMap<CacheKey, MatchStrategy>> = Lazy::new(DashMap::new);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: MatchKind,
    case_sensitive: bool,
    pattern: String,
}

/// Compiled form of a pattern
#[derive(Debug, Clone)]
enum MatchStrategy {
    All,
    Substring { needle: String, case_sensitive: bool },
    Regex(Arc<Regex>),
    Glob(Arc<Pattern>),
}

impl MatchStrategy {
    fn compile(pattern: &str, kind: MatchKind, case_sensitive: bool) -> SearchResult<Self> {
        if pattern.is_empty() {
            return Err(SearchError::invalid_pattern("pattern must not be empty"));
        }
        if pattern == MATCH_ALL {
            return Ok(Self::All);
        }
        match kind {
            MatchKind::Substring => Ok(Self::Substring {
                needle: if case_sensitive {
                    pattern.to_string()
                } else {
                    pattern.to_lowercase()
                },
                case_sensitive,
            }),
            MatchKind::Regex => Regex::new(pattern)
                .map(|re| Self::Regex(Arc::new(re)))
                .map_err(|e| SearchError::invalid_pattern(format!("{pattern}: {e}"))),
            MatchKind::Glob => Pattern::new(pattern)
                .map(|p| Self::Glob(Arc::new(p)))
                .map_err(|e| SearchError::invalid_pattern(format!("{pattern}: {e}"))),
        }
    }
}

/// Decides whether a path matches the primary pattern.
///
/// Substring and regex patterns are tried against the path relative to the
/// root and against its base name; globs only against the base name.
/// Compiled patterns are cached for the life of the process.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    strategy: MatchStrategy,
}

impl Matcher {
    /// Compiles `pattern` as `kind`. Substring matching is case-sensitive.
    pub fn compile(pattern: &str, kind: MatchKind) -> SearchResult<Self> {
        Self::with_metrics(pattern, kind, true, &SearchMetrics::new())
    }

    /// Compiles `pattern` as configured by `options`.
    pub fn from_options(
        pattern: &str,
        options: &FilterOptions,
        metrics: &SearchMetrics,
    ) -> SearchResult<Self> {
        Self::with_metrics(pattern, options.match_kind, options.case_sensitive, metrics)
    }

    fn with_metrics(
        pattern: &str,
        kind: MatchKind,
        case_sensitive: bool,
        metrics: &SearchMetrics,
    ) -> SearchResult<Self> {
        let key = CacheKey {
            kind,
            // Only substring matching folds case.
            case_sensitive: case_sensitive || kind != MatchKind::Substring,
            pattern: pattern.to_string(),
        };

        let strategy = if let Some(entry) = PATTERN_CACHE.get(&key) {
            metrics.record_cache_operation(true);
            entry.clone()
        } else {
            let strategy = MatchStrategy::compile(pattern, kind, key.case_sensitive)?;
            metrics.record_cache_operation(false);
            PATTERN_CACHE.insert(key, strategy.clone());
            strategy
        };

        Ok(Self {
            pattern: pattern.to_string(),
            strategy,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// True for the list-everything pattern, which skips matching entirely.
    pub fn is_match_all(&self) -> bool {
        matches!(self.strategy, MatchStrategy::All)
    }

    /// Matches a path relative to the traversal root.
    pub fn matches(&self, relative: &Path) -> bool {
        let name = base_name(relative);
        match &self.strategy {
            MatchStrategy::All => true,
            MatchStrategy::Substring {
                needle,
                case_sensitive: true,
            } => {
                let path = relative.to_string_lossy();
                path.contains(needle.as_str()) || name.contains(needle.as_str())
            }
            MatchStrategy::Substring { needle, .. } => {
                let path = relative.to_string_lossy().to_lowercase();
                path.contains(needle.as_str()) || name.to_lowercase().contains(needle.as_str())
            }
            MatchStrategy::Regex(re) => {
                re.is_match(&relative.to_string_lossy()) || re.is_match(&name)
            }
            MatchStrategy::Glob(glob) => glob.matches(&name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_matching() {
        let matcher = Matcher::compile(".txt", MatchKind::Substring).unwrap();
        assert!(matcher.matches(Path::new("a.txt")));
        assert!(matcher.matches(Path::new("sub/c.txt")));
        assert!(!matcher.matches(Path::new("b.log")));

        // The relative path counts, not only the base name.
        let matcher = Matcher::compile("sub/", MatchKind::Substring).unwrap();
        assert!(matcher.matches(Path::new("sub/c.txt")));
        assert!(!matcher.matches(Path::new("c.txt")));
    }

    #[test]
    fn test_substring_case_folding() {
        let metrics = SearchMetrics::new();
        let insensitive = Matcher::from_options(
            "README",
            &FilterOptions::new(MatchKind::Substring),
            &metrics,
        )
        .unwrap();
        assert!(insensitive.matches(Path::new("docs/readme.md")));

        let sensitive = Matcher::compile("README", MatchKind::Substring).unwrap();
        assert!(!sensitive.matches(Path::new("docs/readme.md")));
        assert!(sensitive.matches(Path::new("docs/README.md")));
    }

    #[test]
    fn test_regex_matching() {
        let matcher = Matcher::compile(r"^c\.txt$", MatchKind::Regex).unwrap();
        // Anchored on the base name.
        assert!(matcher.matches(Path::new("sub/c.txt")));

        let matcher = Matcher::compile(r"^sub/.*\.txt$", MatchKind::Regex).unwrap();
        assert!(matcher.matches(Path::new("sub/c.txt")));
        assert!(!matcher.matches(Path::new("a.txt")));
    }

    #[test]
    fn test_invalid_regex() {
        let err = Matcher::compile("[", MatchKind::Regex).unwrap_err();
        assert!(matches!(err, SearchError::InvalidPattern(_)));
        let message = err.to_string();
        assert!(message.starts_with("Invalid pattern: [: "));
        assert!(!message.contains('\n'));
        assert!(message.contains("unclosed character class"));
    }

    #[test]
    fn test_glob_matches_base_name_only() {
        let matcher = Matcher::compile("*.rs", MatchKind::Glob).unwrap();
        assert!(matcher.matches(Path::new("src/main.rs")));
        assert!(!matcher.matches(Path::new("src/main.rsx")));

        let matcher = Matcher::compile("src*", MatchKind::Glob).unwrap();
        assert!(!matcher.matches(Path::new("src/main.rs")));

        let matcher = Matcher::compile("?.t[xy]t", MatchKind::Glob).unwrap();
        assert!(matcher.matches(Path::new("deep/a.txt")));
        assert!(!matcher.matches(Path::new("ab.txt")));
    }

    #[test]
    fn test_empty_and_invalid_globs() {
        assert!(matches!(
            Matcher::compile("", MatchKind::Glob),
            Err(SearchError::InvalidPattern(_))
        ));
        assert!(matches!(
            Matcher::compile("[a-", MatchKind::Glob),
            Err(SearchError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_match_all() {
        for kind in [MatchKind::Substring, MatchKind::Regex, MatchKind::Glob] {
            let matcher = Matcher::compile(MATCH_ALL, kind).unwrap();
            assert!(matcher.is_match_all());
            assert!(matcher.matches(Path::new("anything/at/all")));
        }
        assert!(!Matcher::compile("a", MatchKind::Substring)
            .unwrap()
            .is_match_all());
    }

    #[test]
    fn test_pattern_caching() {
        // Unique pattern so other tests cannot have cached it already.
        let unique_pattern = format!(
            "cache_probe_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );
        let metrics = SearchMetrics::new();
        let options = FilterOptions::new(MatchKind::Regex);

        let _first = Matcher::from_options(&unique_pattern, &options, &metrics).unwrap();
        assert_eq!(metrics.cache_hits(), 0, "First compile should miss");
        assert_eq!(metrics.cache_misses(), 1);

        let second = Matcher::from_options(&unique_pattern, &options, &metrics).unwrap();
        assert_eq!(metrics.cache_hits(), 1, "Second compile should hit");
        assert_eq!(metrics.cache_misses(), 1);
        assert_eq!(second.pattern(), unique_pattern);
    }
}
