use anyhow::Result;
use pathscout::{
    find, find_with, validate_depth, validate_max_threads, CancellationToken, EntryType,
    FilterOptions, FindRequest, IgnoreCache, MatchKind, SearchError, SearchOutput,
    TraversalConfig,
};
use std::collections::BTreeSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

/// root/{a.txt, b.log, sub/c.txt}
fn create_scenario_tree() -> Result<TempDir> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.txt"), "a")?;
    fs::write(dir.path().join("b.log"), "b")?;
    fs::create_dir(dir.path().join("sub"))?;
    fs::write(dir.path().join("sub/c.txt"), "c")?;
    Ok(dir)
}

fn create_deep_tree(dir: &TempDir, width: usize, depth: usize) -> Result<()> {
    for i in 0..width {
        let mut current = dir.path().join(format!("branch_{}", i));
        for level in 0..depth {
            fs::create_dir_all(&current)?;
            fs::write(current.join(format!("file_{}.txt", level)), "x")?;
            current = current.join(format!("level_{}", level + 1));
        }
    }
    Ok(())
}

fn traversal(root: &Path, max_depth: i64, threads: usize) -> Result<TraversalConfig> {
    Ok(TraversalConfig::new(root)
        .with_max_depth(validate_depth(max_depth)?)
        .with_max_workers(NonZeroUsize::new(threads).unwrap()))
}

fn relative_results(root: &Path, output: &SearchOutput) -> BTreeSet<String> {
    output
        .results
        .iter()
        .map(|p| {
            Path::new(p)
                .strip_prefix(root)
                .unwrap_or(Path::new(p))
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_substring_unlimited_depth() -> Result<()> {
    let dir = create_scenario_tree()?;
    let request = FindRequest::new(".txt", traversal(dir.path(), -1, 2)?);

    let output = find(&request)?;
    assert!(output.completed);
    assert!(output.first_error.is_none());
    assert_eq!(relative_results(dir.path(), &output), set(&["a.txt", "sub/c.txt"]));
    Ok(())
}

#[test]
fn test_substring_depth_zero_prunes_subdirectories() -> Result<()> {
    let dir = create_scenario_tree()?;
    let request = FindRequest::new(".txt", traversal(dir.path(), 0, 2)?);

    let output = find(&request)?;
    assert_eq!(relative_results(dir.path(), &output), set(&["a.txt"]));
    Ok(())
}

#[test]
fn test_match_all_with_exclude() -> Result<()> {
    let dir = create_scenario_tree()?;
    let mut request = FindRequest::new(".", traversal(dir.path(), -1, 2)?);
    request.filters.exclude_globs.insert("*.log".to_string());

    let output = find(&request)?;
    assert_eq!(
        relative_results(dir.path(), &output),
        set(&["a.txt", "sub", "sub/c.txt"])
    );
    Ok(())
}

#[test]
fn test_invalid_regex_rejected_before_traversal() -> Result<()> {
    // The root does not exist, so reaching the walk would report PathNotFound.
    let dir = tempdir()?;
    let missing = dir.path().join("never-created");
    let mut request = FindRequest::new("[", TraversalConfig::new(&missing));
    request.filters = FilterOptions::new(MatchKind::Regex);

    match find(&request) {
        Err(SearchError::InvalidPattern(_)) => Ok(()),
        other => panic!("expected InvalidPattern, got {:?}", other),
    }
}

#[test]
fn test_thread_count_validation() {
    for bad in [0, -1, -16] {
        assert!(matches!(
            validate_max_threads(bad),
            Err(SearchError::InvalidThreadCount { .. })
        ));
    }
    assert!(validate_max_threads(1).is_ok());
}

#[test]
fn test_depth_validation() {
    assert!(matches!(validate_depth(-2), Err(SearchError::InvalidDepth(-2))));
    assert_eq!(validate_depth(-1).unwrap(), None);
}

#[test]
fn test_depth_bound_holds_for_every_result() -> Result<()> {
    let dir = tempdir()?;
    create_deep_tree(&dir, 4, 6)?;

    for max_depth in 0..6 {
        let request = FindRequest::new(".", traversal(dir.path(), max_depth, 3)?);
        let output = find(&request)?;
        assert!(!output.results.is_empty());
        for path in relative_results(dir.path(), &output) {
            let separators = path.matches('/').count() as i64;
            assert!(
                separators <= max_depth,
                "{} exceeds depth {}",
                path,
                max_depth
            );
        }
    }
    Ok(())
}

#[test]
fn test_results_independent_of_thread_count() -> Result<()> {
    let dir = tempdir()?;
    create_deep_tree(&dir, 12, 5)?;

    let max = num_threads();
    let baseline = find(&FindRequest::new("file_", traversal(dir.path(), -1, 1)?))?;
    assert_eq!(baseline.results.len(), 12 * 5);

    for threads in [2, 4, 8].into_iter().filter(|t| *t <= max) {
        let output = find(&FindRequest::new("file_", traversal(dir.path(), -1, threads)?))?;
        assert_eq!(output.results, baseline.results);
    }
    Ok(())
}

#[test]
fn test_idempotent_runs() -> Result<()> {
    let dir = tempdir()?;
    create_deep_tree(&dir, 5, 4)?;
    let mut request = FindRequest::new("level", traversal(dir.path(), -1, 2)?);
    request.filters.exclude_globs.insert("branch_3".to_string());

    let first = find(&request)?;
    let second = find(&request)?;
    assert!(!first.results.is_empty());
    assert_eq!(first.results, second.results);
    assert!(relative_results(dir.path(), &first)
        .iter()
        .all(|p| !p.starts_with("branch_3")));
    Ok(())
}

#[test]
fn test_exclusion_precedence() -> Result<()> {
    let dir = create_scenario_tree()?;
    let mut request = FindRequest::new("c.txt", traversal(dir.path(), -1, 2)?);
    request.filters.exclude_globs.insert("sub".to_string());

    let output = find(&request)?;
    assert!(output.results.is_empty());
    Ok(())
}

#[test]
fn test_gitignore_prefix_rule() -> Result<()> {
    let dir = create_scenario_tree()?;
    fs::write(dir.path().join(".gitignore"), "# generated\nsub/\n")?;

    let mut config = traversal(dir.path(), -1, 2)?;
    let output = find(&FindRequest::new("c.txt", config.clone()))?;
    assert!(output.results.is_empty());

    config = config.with_ignored(true);
    let output = find(&FindRequest::new("c.txt", config))?;
    assert_eq!(relative_results(dir.path(), &output), set(&["sub/c.txt"]));
    Ok(())
}

#[test]
fn test_hidden_entries() -> Result<()> {
    let dir = create_scenario_tree()?;
    fs::create_dir(dir.path().join(".cache"))?;
    fs::write(dir.path().join(".cache/blob.txt"), "x")?;

    let config = traversal(dir.path(), -1, 2)?;
    let output = find(&FindRequest::new("blob", config.clone()))?;
    assert!(output.results.is_empty());

    let output = find(&FindRequest::new("blob", config.with_hidden(true)))?;
    assert_eq!(relative_results(dir.path(), &output), set(&[".cache/blob.txt"]));
    Ok(())
}

#[test]
fn test_glob_and_type_filters() -> Result<()> {
    let dir = create_scenario_tree()?;

    let mut request = FindRequest::new("*.txt", traversal(dir.path(), -1, 2)?);
    request.filters = FilterOptions::new(MatchKind::Glob);
    let output = find(&request)?;
    assert_eq!(relative_results(dir.path(), &output), set(&["a.txt", "sub/c.txt"]));

    let mut request = FindRequest::new(".", traversal(dir.path(), -1, 2)?);
    request.filters.type_filter = Some(EntryType::Dir);
    let output = find(&request)?;
    assert_eq!(relative_results(dir.path(), &output), set(&["sub"]));

    let mut request = FindRequest::new(".", traversal(dir.path(), -1, 2)?);
    request.filters.extension_filter = Some("log".to_string());
    let output = find(&request)?;
    assert_eq!(relative_results(dir.path(), &output), set(&["b.log"]));
    Ok(())
}

#[test]
fn test_conflicting_options() -> Result<()> {
    let dir = create_scenario_tree()?;
    let mut request = FindRequest::new("x", traversal(dir.path(), -1, 1)?);
    request.filters.type_filter = Some(EntryType::File);
    request.filters.extension_filter = Some("txt".to_string());

    assert!(matches!(find(&request), Err(SearchError::ConflictingOptions(_))));
    Ok(())
}

#[test]
fn test_absolute_paths() -> Result<()> {
    let dir = create_scenario_tree()?;
    let mut request = FindRequest::new("sub", traversal(dir.path(), -1, 2)?);
    request.filters.absolute_path = true;

    let output = find(&request)?;
    assert_eq!(output.results.len(), 2);
    for path in output.results.iter() {
        assert!(Path::new(path).is_absolute());
    }
    let sep = std::path::MAIN_SEPARATOR;
    assert!(output.results.iter().any(|p| p.ends_with(&format!("sub{sep}"))));
    assert!(output.results.iter().any(|p| p.ends_with("c.txt")));
    Ok(())
}

#[test]
fn test_pathname_narrowing() -> Result<()> {
    let dir = create_scenario_tree()?;

    let mut request = FindRequest::new(".txt", traversal(dir.path(), -1, 2)?);
    request.pathname = Some("sub".to_string());
    let output = find(&request)?;
    assert_eq!(relative_results(dir.path(), &output), set(&["sub/c.txt"]));

    request.pathname = Some("does-not-exist".to_string());
    assert!(matches!(find(&request), Err(SearchError::PathNotFound(_))));
    Ok(())
}

#[test]
fn test_missing_root() -> Result<()> {
    let dir = tempdir()?;
    let request = FindRequest::new(".", TraversalConfig::new(dir.path().join("missing")));
    assert!(matches!(find(&request), Err(SearchError::PathNotFound(_))));
    Ok(())
}

#[test]
fn test_cancellation_marks_output_incomplete() -> Result<()> {
    let dir = tempdir()?;
    create_deep_tree(&dir, 10, 5)?;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let request = FindRequest::new(".", traversal(dir.path(), -1, 2)?);
    let output = find_with(&request, &cancel, Arc::new(IgnoreCache::new()))?;
    assert!(!output.completed);
    assert!(matches!(output.into_result(), Err(SearchError::Cancelled)));
    Ok(())
}

#[test]
fn test_ignore_cache_reused_across_runs() -> Result<()> {
    let dir = create_scenario_tree()?;
    fs::write(dir.path().join(".gitignore"), "*.log\n")?;
    fs::write(dir.path().join(".dockerignore"), "target\n")?;

    let cache = Arc::new(IgnoreCache::new());
    let request = FindRequest::new(".", traversal(dir.path(), -1, 2)?);
    for _ in 0..3 {
        let output = find_with(&request, &CancellationToken::new(), Arc::clone(&cache))?;
        assert!(!relative_results(dir.path(), &output).contains("b.log"));
    }
    assert_eq!(cache.parse_count(), 2);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_skipped() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = create_scenario_tree()?;
    let locked = dir.path().join("locked");
    fs::create_dir(&locked)?;
    fs::write(locked.join("secret.txt"), "x")?;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;

    // Privileged users can read the directory anyway.
    let readable = fs::read_dir(&locked).is_ok();

    let request = FindRequest::new(".txt", traversal(dir.path(), -1, 2)?);
    let output = find(&request);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
    let output = output?;

    let found = relative_results(dir.path(), &output);
    assert!(found.contains("a.txt"));
    assert!(found.contains("sub/c.txt"));
    if !readable {
        assert!(matches!(output.first_error, Some(SearchError::Traversal { .. })));
        assert!(!found.contains("locked/secret.txt"));
    }
    Ok(())
}

fn num_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
